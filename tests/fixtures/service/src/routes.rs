use crate::api::{health, users};
use web::Router;

pub fn router() -> Router {
    let router = Router::new()
        .get("/health", health::check)
        .nest("/admin", admin());

    let api = router.group("/api/v1");
    api.get("/users/:id", users::get_user);
    api.route("/users", web::routing::post(users::create_user).get(users::list_users));
    router
}

fn admin() -> Router {
    Router::new().delete("/cache", health::flush_cache)
}
