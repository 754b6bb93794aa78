#[macro_use]
extern crate rocket;

use card_conquer::rocket_initialize;

#[launch]
fn rocket() -> _ {
    rocket_initialize()
}
