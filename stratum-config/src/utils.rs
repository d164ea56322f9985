use std::time::Duration;

use knuffel::errors::DecodeError;

/// Non-zero duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Millis(pub u32);

impl Millis {
    pub fn to_duration(self) -> Duration {
        Duration::from_millis(u64::from(self.0))
    }
}

impl<S: knuffel::traits::ErrorSpan> knuffel::DecodeScalar<S> for Millis {
    fn type_check(
        type_name: &Option<knuffel::span::Spanned<knuffel::ast::TypeName, S>>,
        ctx: &mut knuffel::decode::Context<S>,
    ) {
        if let Some(type_name) = &type_name {
            ctx.emit_error(DecodeError::unexpected(
                type_name,
                "type name",
                "no type name expected for this node",
            ));
        }
    }

    fn raw_decode(
        val: &knuffel::span::Spanned<knuffel::ast::Literal, S>,
        ctx: &mut knuffel::decode::Context<S>,
    ) -> Result<Self, DecodeError<S>> {
        match &**val {
            knuffel::ast::Literal::Int(ref value) => match u32::try_from(value) {
                Ok(0) => {
                    ctx.emit_error(DecodeError::conversion(val, "value must be above 0"));
                    Ok(Millis(1))
                }
                Ok(v) => Ok(Millis(v)),
                Err(e) => {
                    ctx.emit_error(DecodeError::conversion(val, e));
                    Ok(Millis(1))
                }
            },
            _ => {
                ctx.emit_error(DecodeError::unsupported(
                    val,
                    "Unsupported value, only integers are recognized",
                ));
                Ok(Millis(1))
            }
        }
    }
}
