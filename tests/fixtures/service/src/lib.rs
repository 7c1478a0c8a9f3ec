//! A small user service

pub mod api;
pub mod auth;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests {
    #[test]
    fn smoke() {}
}
