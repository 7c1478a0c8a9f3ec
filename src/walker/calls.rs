use crate::resolver::call::FnBody;
use crate::resolver::CallSite;
use std::collections::HashMap;
use syn::visit::{self, Visit};

/// A call found in a function body.
#[derive(Debug, Clone, Copy)]
pub struct CollectedCall<'a> {
    pub site: CallSite<'a>,
    /// Annotated type of the `let` this call initializes
    pub let_type: Option<&'a syn::Type>,
}

/// Every function and method call of a body, in evaluation order (arguments and receivers
/// before the call that uses them). Nested item declarations are not entered; closures are.
pub fn collect_calls(body: &FnBody) -> Vec<CollectedCall<'_>> {
    let mut collector = CallCollector::default();
    body.visit(&mut collector);
    collector.calls
}

#[derive(Default)]
struct CallCollector<'a> {
    calls: Vec<CollectedCall<'a>>,
    /// Address of an initializing call expression → the `let` annotation
    annotated: HashMap<usize, &'a syn::Type>,
}

impl<'a> Visit<'a> for CallCollector<'a> {
    fn visit_local(&mut self, local: &'a syn::Local) {
        if let (syn::Pat::Type(pat), Some(init)) = (&local.pat, &local.init) {
            let call = initializing_call(&init.expr);
            self.annotated.insert(call as *const syn::Expr as usize, &pat.ty);
        }
        visit::visit_local(self, local);
    }

    fn visit_expr(&mut self, expr: &'a syn::Expr) {
        visit::visit_expr(self, expr);

        let site = match expr {
            syn::Expr::Call(call) => CallSite::Function(call),
            syn::Expr::MethodCall(call) => CallSite::Method(call),
            _ => return,
        };
        let let_type = self
            .annotated
            .get(&(expr as *const syn::Expr as usize))
            .copied();
        self.calls.push(CollectedCall { site, let_type });
    }

    fn visit_item(&mut self, _item: &'a syn::Item) {}
}

/// The call whose value a `let` ends up holding: `ctx.bind_json()` in
/// `let u: User = ctx.bind_json().await?.unwrap();`
fn initializing_call(expr: &syn::Expr) -> &syn::Expr {
    match expr {
        syn::Expr::Try(inner) => initializing_call(&inner.expr),
        syn::Expr::Await(inner) => initializing_call(&inner.base),
        syn::Expr::Paren(inner) => initializing_call(&inner.expr),
        syn::Expr::MethodCall(call)
            if matches!(
                call.method.to_string().as_str(),
                "unwrap" | "expect" | "unwrap_or_default" | "unwrap_or" | "unwrap_or_else"
            ) =>
        {
            initializing_call(&call.receiver)
        }
        other => other,
    }
}
