use crate::error::{AnalysisError, Result};
use crate::materializer::{Materializer, ResolvedType, Shape};
use crate::model::{Field, Route};
use crate::resolver::types::StaticType;
use crate::resolver::{CallSite, ConstValue, Resolver, Scope};
use log::debug;

/// What to do with one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgOperation {
    Ignore,
    StatusCode,
    TypeOf,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Positional(ArgOperation),
    /// Type of the call itself
    TargetType,
}

/// The evaluated form of one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Ignored,
    StatusCode(u16),
    Type(ResolvedType),
    Value(ConstValue),
}

/// Evaluated arguments of a call, handed to the mapper of [`CallBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<ArgValue>,
    target: Option<ResolvedType>,
}

impl Arguments {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&ArgValue> {
        self.values.get(index).ok_or_else(|| AnalysisError::Index {
            what: "call arguments".to_string(),
            index,
            len: self.values.len(),
        })
    }

    pub fn status_code(&self, index: usize) -> Result<u16> {
        match self.get(index)? {
            ArgValue::StatusCode(code) => Ok(*code),
            other => Err(mismatch("status code", other)),
        }
    }

    pub fn resolved(&self, index: usize) -> Result<&ResolvedType> {
        match self.get(index)? {
            ArgValue::Type(resolved) => Ok(resolved),
            other => Err(mismatch("type", other)),
        }
    }

    pub fn field(&self, index: usize) -> Result<Field> {
        Ok(self.resolved(index)?.to_field())
    }

    pub fn value(&self, index: usize) -> Result<&ConstValue> {
        match self.get(index)? {
            ArgValue::Value(value) => Ok(value),
            other => Err(mismatch("value", other)),
        }
    }

    /// A value that must be a string, like a parameter or header name
    pub fn string(&self, index: usize) -> Result<String> {
        match self.value(index)? {
            ConstValue::Str(s) => Ok(s.clone()),
            other => Err(AnalysisError::structural("string", other.to_string())),
        }
    }

    /// Type the call produces, from its turbofish or the `let` it initializes
    pub fn target(&self) -> Result<&ResolvedType> {
        self.target
            .as_ref()
            .ok_or_else(|| AnalysisError::structural("target type", "none requested"))
    }
}

fn mismatch(expected: &str, found: &ArgValue) -> AnalysisError {
    let found = match found {
        ArgValue::Ignored => "ignored argument",
        ArgValue::StatusCode(_) => "status code",
        ArgValue::Type(_) => "type",
        ArgValue::Value(_) => "value",
    };
    AnalysisError::structural(expected, found)
}

/// Describes how to read the arguments of one call, then folds them into a route.
///
/// Positional operations apply to the call's arguments in the order they are requested;
/// [`target_type`](Self::target_type) does not consume one.
///
/// ```ignore
/// builder.status_code().type_of();
/// let route = builder.build(|mut route, args| {
///     route.add_return_type(ReturnType {
///         status_code: args.status_code(0)?,
///         content_type: "application/json".into(),
///         field: args.field(1)?,
///     });
///     Ok(route)
/// })?;
/// ```
pub struct CallBuilder<'w> {
    resolver: &'w mut Resolver,
    materializer: &'w mut Materializer,
    scope: &'w Scope,
    call: CallSite<'w>,
    let_type: Option<&'w syn::Type>,
    route: &'w Route,
    operations: Vec<Operation>,
}

impl<'w> CallBuilder<'w> {
    pub fn new(
        resolver: &'w mut Resolver,
        materializer: &'w mut Materializer,
        scope: &'w Scope,
        call: CallSite<'w>,
        let_type: Option<&'w syn::Type>,
        route: &'w Route,
    ) -> Self {
        Self {
            resolver,
            materializer,
            scope,
            call,
            let_type,
            route,
            operations: Vec::new(),
        }
    }

    /// Method name, or the last segment of the called path
    pub fn name(&self) -> String {
        self.call.name()
    }

    pub fn call(&self) -> CallSite<'w> {
        self.call
    }

    pub fn scope(&self) -> &Scope {
        self.scope
    }

    /// The route as it stands before this call
    pub fn route(&self) -> &Route {
        self.route
    }

    pub fn arg_count(&self) -> usize {
        self.call.args().len()
    }

    /// Whether this is a method call on the local named `context`
    pub fn is_method_on(&self, context: &str) -> bool {
        self.call.receiver().is_some_and(|r| names_local(r, context))
    }

    /// Whether the call is a function call to a path ending in `path` (`auth::require`)
    pub fn is_call_to(&self, path: &str) -> bool {
        match self.call {
            CallSite::Function(call) => match call.func.as_ref() {
                syn::Expr::Path(p) => {
                    let written = crate::parser::path_to_string(&p.path);
                    written == path || written.ends_with(&format!("::{}", path))
                }
                _ => false,
            },
            CallSite::Method(_) => false,
        }
    }

    pub fn ignore(&mut self) -> &mut Self {
        self.operations.push(Operation::Positional(ArgOperation::Ignore));
        self
    }

    pub fn status_code(&mut self) -> &mut Self {
        self.operations.push(Operation::Positional(ArgOperation::StatusCode));
        self
    }

    pub fn type_of(&mut self) -> &mut Self {
        self.operations.push(Operation::Positional(ArgOperation::TypeOf));
        self
    }

    pub fn value(&mut self) -> &mut Self {
        self.operations.push(Operation::Positional(ArgOperation::Value));
        self
    }

    pub fn target_type(&mut self) -> &mut Self {
        self.operations.push(Operation::TargetType);
        self
    }

    /// Evaluates the requested operations and passes the results to `mapper`.
    ///
    /// The requested operations are cleared, so a builder can be reused for another attempt.
    ///
    /// # Errors
    ///
    /// Stops at the first operation that fails; requesting more positional operations than
    /// the call has arguments is an index error.
    pub fn build<F>(&mut self, mapper: F) -> Result<Route>
    where
        F: FnOnce(Route, Arguments) -> Result<Route>,
    {
        let operations = std::mem::take(&mut self.operations);
        let args = self.call.args();
        let mut arguments = Arguments::default();
        let mut position = 0;

        for operation in operations {
            let operation = match operation {
                Operation::TargetType => {
                    arguments.target = Some(self.evaluate_target()?);
                    continue;
                }
                Operation::Positional(operation) => operation,
            };

            let arg = args.get(position).copied().ok_or_else(|| AnalysisError::Index {
                what: format!("arguments of {}", self.call.name()),
                index: position,
                len: args.len(),
            })?;
            position += 1;

            let value = match operation {
                ArgOperation::Ignore => ArgValue::Ignored,
                ArgOperation::StatusCode => ArgValue::StatusCode(self.evaluate_status(arg)?),
                ArgOperation::TypeOf => {
                    let ty = self.resolver.expression_type(self.scope, arg)?;
                    let mut resolved = self.materializer.materialize(self.resolver, &ty)?;
                    if matches!(resolved.shape, Shape::Primitive(_)) {
                        resolved.constant = self.resolver.expression_value(self.scope, arg).ok();
                    }
                    ArgValue::Type(resolved)
                }
                ArgOperation::Value => ArgValue::Value(self.resolver.expression_value(self.scope, arg)?),
            };
            arguments.values.push(value);
        }

        mapper(self.route.clone(), arguments)
    }

    fn evaluate_status(&mut self, arg: &syn::Expr) -> Result<u16> {
        let value = self.resolver.expression_value(self.scope, arg)?;
        value
            .as_int()
            .and_then(|code| u16::try_from(code).ok())
            .ok_or_else(|| AnalysisError::structural("HTTP status code", value.to_string()))
    }

    fn evaluate_target(&mut self) -> Result<ResolvedType> {
        let written = self.call.turbofish().first().copied().or(self.let_type);
        let Some(ty) = written else {
            return Err(AnalysisError::structural(
                "turbofish or annotated let",
                format!("{} without a target type", self.call.name()),
            ));
        };
        let mut lowered = self.resolver.lower_type(self.scope, ty)?;
        // `let user: Result<User, _> = ctx.bind_json();`
        if let StaticType::Fallible(ok, _) = lowered {
            lowered = *ok;
        }
        debug!("Target type of {} is {}", self.call.name(), lowered);
        self.materializer.materialize(self.resolver, &lowered)
    }
}

/// Whether `expr` is the local `name`, possibly borrowed or parenthesized
pub(crate) fn names_local(expr: &syn::Expr, name: &str) -> bool {
    match expr {
        syn::Expr::Path(path) => path.qself.is_none() && path.path.is_ident(name),
        syn::Expr::Reference(reference) => names_local(&reference.expr, name),
        syn::Expr::Paren(paren) => names_local(&paren.expr, name),
        // `&mut *ctx`
        syn::Expr::Unary(unary) if matches!(unary.op, syn::UnOp::Deref(_)) => names_local(&unary.expr, name),
        _ => false,
    }
}
