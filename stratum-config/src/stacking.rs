pub const DEFAULT_CONTAINER_SPAN: i32 = 100_000_000;
pub const DEFAULT_FOCUS_BONUS: i32 = 0x4000_0000;

/// Stacking key encoding constants.
///
/// These are decoded as-is; range checks happen when the stacking policy is built from them.
#[derive(knuffel::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stacking {
    #[knuffel(child, unwrap(argument), default = DEFAULT_CONTAINER_SPAN)]
    pub container_span: i32,
    #[knuffel(child, unwrap(argument), default = DEFAULT_FOCUS_BONUS)]
    pub focus_bonus: i32,
}

impl Default for Stacking {
    fn default() -> Self {
        Self {
            container_span: DEFAULT_CONTAINER_SPAN,
            focus_bonus: DEFAULT_FOCUS_BONUS,
        }
    }
}
