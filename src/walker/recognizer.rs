use super::builder::CallBuilder;
use crate::error::Result;
use crate::model::Route;

/// Outcome of offering a call to a [`Recognizer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Handling {
    /// The call was recognized; the route replaces the walker's current one
    Handled(Route),
    /// Not this recognizer's call; default handling continues
    NotHandled,
}

/// A caller-supplied hook that recognizes framework calls the built-in table does not know.
///
/// Recognizers are offered every call of a handler body, in registration order, before the
/// walker applies its own rules. `context` is the name the walked function binds the request
/// context to.
pub trait Recognizer {
    fn try_handle(&self, context: &str, builder: &mut CallBuilder<'_>) -> Result<Handling>;
}

/// A [`Recognizer`] backed by a closure; see [`from_fn`].
pub struct FnRecognizer<F>(F);

impl<F> Recognizer for FnRecognizer<F>
where
    F: Fn(&str, &mut CallBuilder<'_>) -> Result<Handling>,
{
    fn try_handle(&self, context: &str, builder: &mut CallBuilder<'_>) -> Result<Handling> {
        (self.0)(context, builder)
    }
}

/// Wraps a closure as a recognizer.
///
/// ```ignore
/// analyzer.register_recognizer(from_fn(|_ctx, builder| {
///     if !builder.is_call_to("auth::require_token") {
///         return Ok(Handling::NotHandled);
///     }
///     let mut route = builder.route().clone();
///     route.add_request_header(Param::new("Authorization", Field::primitive(PrimitiveType::String), true));
///     Ok(Handling::Handled(route))
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FnRecognizer<F>
where
    F: Fn(&str, &mut CallBuilder<'_>) -> Result<Handling>,
{
    FnRecognizer(f)
}
