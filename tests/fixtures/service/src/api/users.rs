use crate::auth;
use crate::models::{ApiError, NewUser, Page, User};
use http::StatusCode;
use web::Context;

/// Fetches one user
pub fn get_user(ctx: &mut Context) {
    auth::require_token(ctx);
    let id = ctx.param("id");
    let _expand = ctx.query("expand");

    let user: User = lookup(&id);
    ctx.json(StatusCode::OK, &user);
    ctx.json(404, &ApiError { code: 404, message: String::new() });
}

/// Creates a user
pub fn create_user(ctx: &mut Context) {
    auth::require_token(ctx);
    let _body: NewUser = ctx.bind_json();
    ctx.set_header("Location", "/api/v1/users/1");
    ctx.status(StatusCode::CREATED);
    ctx.json(400, &ApiError { code: 400, message: String::new() });
}

pub fn list_users(ctx: &mut Context) {
    let _size = ctx.query("page_size");
    let page: Page<User> = Page { items: Vec::new(), total: 0 };
    ctx.json(200, &page);
}

fn lookup(id: &str) -> User {
    unimplemented!()
}
