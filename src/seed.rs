//! Demo data for local development: two users, one project with both as
//! members, and three tasks in different states.

use crate::auth::hash_password;
use crate::error::AppError;
use crate::models::{
    NewProject, NewTask, NewUser, Project, Role, TaskPriority, TaskStatus, TaskUpdate, User,
};
use crate::store::Store;

pub const DEMO_PASSWORD: &str = "password123";
pub const OWNER_EMAIL: &str = "alice@example.com";
pub const MEMBER_EMAIL: &str = "bob@example.com";

/// What a seeding run produced.
#[derive(Debug)]
pub enum Seeded {
    Created { project: Project, tasks: usize },
    AlreadyPresent,
}

struct DemoTask {
    title: &'static str,
    description: &'static str,
    status: TaskStatus,
    priority: TaskPriority,
    assignee: Option<Role>,
}

const DEMO_TASKS: [DemoTask; 3] = [
    DemoTask {
        title: "Initial Setup",
        description: "Set up repo and environment",
        status: TaskStatus::Done,
        priority: TaskPriority::Medium,
        assignee: Some(Role::Owner),
    },
    DemoTask {
        title: "Design Wireframes",
        description: "Create low-fidelity wireframes",
        status: TaskStatus::InProgress,
        priority: TaskPriority::High,
        assignee: Some(Role::Member),
    },
    DemoTask {
        title: "Database Schema",
        description: "Design the relational schema",
        status: TaskStatus::Todo,
        priority: TaskPriority::Low,
        assignee: None,
    },
];

async fn demo_user(
    store: &dyn Store,
    name: &str,
    email: &str,
    bcrypt_cost: u32,
) -> Result<User, AppError> {
    Ok(store
        .insert_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(DEMO_PASSWORD, bcrypt_cost)?,
        })
        .await?)
}

/// Inserts the demo data unless the demo owner already exists.
pub async fn seed_demo(store: &dyn Store, bcrypt_cost: u32) -> Result<Seeded, AppError> {
    if store.user_by_email(OWNER_EMAIL).await?.is_some() {
        return Ok(Seeded::AlreadyPresent);
    }

    let alice = demo_user(store, "Alice Dev", OWNER_EMAIL, bcrypt_cost).await?;
    let bob = demo_user(store, "Bob Dev", MEMBER_EMAIL, bcrypt_cost).await?;

    let (project, _) = store
        .create_project(NewProject {
            name: "Task Tracker Alpha".to_string(),
            description: "Demo project seeded from script".to_string(),
            start_date: None,
            end_date: None,
            creator_id: alice.id,
        })
        .await?;
    store
        .insert_membership(bob.id, project.id, Role::Member)
        .await?;

    for demo in &DEMO_TASKS {
        let task = store
            .insert_task(NewTask {
                title: demo.title.to_string(),
                description: Some(demo.description.to_string()),
                priority: demo.priority,
                due_date: None,
                project_id: project.id,
                created_by: alice.id,
            })
            .await?;
        if demo.status != TaskStatus::Todo {
            let changes = TaskUpdate {
                status: Some(demo.status),
                ..Default::default()
            };
            store.update_task(task.id, &changes).await?;
        }
        let assignee = match demo.assignee {
            Some(Role::Member) => Some(bob.id),
            Some(_) => Some(alice.id),
            None => None,
        };
        if assignee.is_some() {
            store.set_task_assignee(task.id, assignee).await?;
        }
    }

    log::info!("Seeded 2 users, project {} and {} tasks", project.id, DEMO_TASKS.len());
    Ok(Seeded::Created {
        project,
        tasks: DEMO_TASKS.len(),
    })
}
