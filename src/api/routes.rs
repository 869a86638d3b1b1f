//! Route table. Everything lives under `/api`.

use actix_web::web;

use super::handlers::{appointments, auth, billing, dashboard, doctors, patients, prescriptions};
use crate::error::AppError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::invalid("non_field_errors", err.to_string()).into()
    }))
    .service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/refresh", web::post().to(auth::refresh)),
            )
            .service(
                web::scope("/doctors")
                    .route("", web::get().to(doctors::list))
                    .route("/available", web::get().to(doctors::available))
                    .service(
                        web::resource("/me")
                            .route(web::get().to(doctors::me))
                            .route(web::put().to(doctors::update_me))
                            .route(web::patch().to(doctors::update_me)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(doctors::retrieve))
                            .route(web::put().to(doctors::update))
                            .route(web::patch().to(doctors::update))
                            .route(web::delete().to(doctors::delete)),
                    ),
            )
            .service(
                web::scope("/patients")
                    .route("", web::get().to(patients::list))
                    .service(
                        web::resource("/me")
                            .route(web::get().to(patients::me))
                            .route(web::put().to(patients::update_me))
                            .route(web::patch().to(patients::update_me)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(patients::retrieve))
                            .route(web::put().to(patients::update))
                            .route(web::patch().to(patients::update))
                            .route(web::delete().to(patients::delete)),
                    ),
            )
            .service(
                web::scope("/appointments")
                    .service(
                        web::resource("")
                            .route(web::get().to(appointments::list))
                            .route(web::post().to(appointments::create)),
                    )
                    .route("/{id}/status", web::patch().to(appointments::update_status))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(appointments::retrieve))
                            .route(web::put().to(appointments::update))
                            .route(web::patch().to(appointments::update))
                            .route(web::delete().to(appointments::delete)),
                    ),
            )
            .service(
                web::scope("/billing")
                    .service(
                        web::resource("")
                            .route(web::get().to(billing::list))
                            .route(web::post().to(billing::create)),
                    )
                    .route("/{id}/mark_paid", web::patch().to(billing::mark_paid))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(billing::retrieve))
                            .route(web::put().to(billing::update))
                            .route(web::patch().to(billing::update))
                            .route(web::delete().to(billing::delete)),
                    ),
            )
            .service(
                web::scope("/prescriptions")
                    .service(
                        web::resource("")
                            .route(web::get().to(prescriptions::list))
                            .route(web::post().to(prescriptions::create)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(prescriptions::retrieve))
                            .route(web::put().to(prescriptions::update))
                            .route(web::patch().to(prescriptions::update))
                            .route(web::delete().to(prescriptions::delete)),
                    ),
            )
            .route("/dashboard", web::get().to(dashboard::stats)),
    );
}
