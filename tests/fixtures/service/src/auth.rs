use crate::models::ApiError;
use web::Context;

pub fn require_token(ctx: &mut Context) {
    ctx.header("Authorization");
    ctx.json(401, &ApiError { code: 401, message: String::new() });
}
