#[derive(knuffel::Decode, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DebugConfig {
    #[knuffel(child)]
    pub trace_surfaces: bool,
}
