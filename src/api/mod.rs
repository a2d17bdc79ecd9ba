use rocket::Route;

mod event;
mod health;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(event::routes());
    routes.extend(health::routes());
    routes
}
