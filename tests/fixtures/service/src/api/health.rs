use web::Context;

/// Liveness probe
pub fn check(ctx: &mut Context) {
    ctx.string(200, "ok");
}

pub fn flush_cache(ctx: &mut Context) {
    ctx.status(204);
}
