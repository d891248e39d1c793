pub mod auth;
pub mod health;
pub mod members;
pub mod projects;
pub mod tasks;
pub mod users;

use actix_web::web;

use crate::auth::Authentication;

/// Routes mounted under `/api/v1`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::signup)
            .service(auth::login)
            .service(auth::logout)
            .service(auth::forgot_password)
            .service(auth::reset_password)
            .service(auth::update_my_password),
    )
    .service(
        // `/me` must be registered before `/{id}`.
        web::scope("/users")
            .service(users::me)
            .service(users::list_users)
            .service(users::get_user)
            .service(users::update_user)
            .service(users::delete_user),
    )
    .service(
        web::scope("/projects")
            .wrap(Authentication::protect())
            .service(projects::list_projects)
            .service(projects::create_project)
            .service(projects::get_project)
            .service(projects::update_project)
            .service(projects::delete_project)
            .service(
                web::scope("/{projectId}/members")
                    .service(members::list_members)
                    .service(members::add_member)
                    .service(members::remove_member)
                    .service(members::make_admin)
                    .service(members::remove_admin),
            )
            .service(
                web::scope("/{projectId}/tasks")
                    .service(tasks::get_tasks)
                    .service(tasks::create_task)
                    .service(tasks::get_task)
                    .service(tasks::update_task)
                    .service(tasks::delete_task)
                    .service(tasks::assign_task)
                    .service(tasks::unassign_task),
            ),
    )
    .service(
        web::scope("/tasks")
            .wrap(Authentication::protect())
            .service(tasks::assign_task)
            .service(tasks::unassign_task),
    );
}
