use askama::Template;
use axum::{
    extract::{Form, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    app::AppState,
    errors::{AppError, LifecycleError},
    handlers::{redirect_with_notice, NoticeQuery, PageContext},
    middleware::current_session,
    models::Department,
};

#[derive(Template)]
#[template(path = "settings.html")]
struct SettingsTemplate {
    layout: PageContext,
    departments: Vec<String>,
}

#[derive(Deserialize)]
pub struct DepartmentForm {
    department: String,
}

#[derive(Deserialize)]
pub struct AdminForm {
    password: String,
}

pub async fn settings_page(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let template = SettingsTemplate {
        layout: PageContext::new(&session, &snapshot, query.notice, "settings"),
        departments: snapshot.departments.iter().map(|d| d.to_string()).collect(),
    };
    Ok(Html(template.render()?))
}

pub async fn select_department(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<DepartmentForm>,
) -> Result<Redirect, AppError> {
    let (mut session, prefs) = current_session(&cookies, &state.tokens);
    let departments = state.registry.snapshot().await.departments;
    let choice = Some(form.department.trim())
        .filter(|name| !name.is_empty())
        .map(Department::from);

    let notice = match session.select_department(&prefs, choice, &departments) {
        Ok(()) => match &session.selected_department {
            Some(department) => format!("Department set to {}.", department),
            None => "Department cleared.".to_string(),
        },
        Err(err @ LifecycleError::UnknownDepartment(_)) => err.to_string(),
        Err(err) => return Err(err.into()),
    };
    Ok(redirect_with_notice("/settings", &notice))
}

pub async fn grant_admin(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<AdminForm>,
) -> Result<Redirect, AppError> {
    let (mut session, prefs) = current_session(&cookies, &state.tokens);
    let notice = match session
        .grant_admin(&prefs, state.registry.requisition_store(), &state.tokens, &form.password)
        .await
    {
        Ok(()) => "Admin mode enabled.".to_string(),
        Err(LifecycleError::Store(err)) => {
            log::error!("admin credential check failed: {}", err);
            "Could not verify the credential right now. Try again later.".to_string()
        }
        Err(err) => err.to_string(),
    };
    Ok(redirect_with_notice("/settings", &notice))
}

pub async fn revoke_admin(cookies: Cookies, State(state): State<AppState>) -> Redirect {
    let (mut session, prefs) = current_session(&cookies, &state.tokens);
    session.revoke_admin(&prefs);
    redirect_with_notice("/settings", "Admin mode disabled.")
}
