pub mod experience;
pub mod follows;
pub mod health;
pub mod skills;
pub mod users;

use actix_web::web;

/// Registers every `/api` route. `/users/{username}` goes last so it does not
/// shadow the fixed `/users/*` paths.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(users::register)
            .service(users::verify)
            .service(users::resend_verification)
            .service(users::login)
            .service(users::logout)
            .service(users::logout_get)
            .service(users::me)
            .service(users::delete_me)
            .service(users::password_reset)
            .service(users::password_verify)
            .service(users::password_change)
            .service(follows::followers)
            .service(follows::following)
            .service(experience::user_experience)
            .service(skills::user_skills)
            .service(users::profile),
    )
    .service(follows::follow)
    .service(follows::unfollow)
    .service(
        web::scope("/experience")
            .service(experience::create_experience)
            .service(experience::update_experience)
            .service(experience::delete_experience),
    )
    .service(
        web::scope("/skills")
            .service(skills::suggestions)
            .service(skills::update_skills),
    );
}
