#[rocket::launch]
fn rocket() -> _ {
    let rocket = yamdb_api::rocket();
    log::info!("starting YaMDb API server");
    rocket
}
