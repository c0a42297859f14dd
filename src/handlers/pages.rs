use axum::{
    Json,
    extract::Path,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    access::{self, Page, PageAccess, Role},
    auth::MaybeAuthUser,
    models::{NavEntry, PageView},
};

/// Builds the view descriptor for a page the role is allowed to open.
pub fn page_view(role: Role, page: Page) -> PageView {
    PageView {
        page,
        title: page.title().to_string(),
        role,
        data_endpoint: access::data_endpoint(role, page).to_string(),
        nav: access::allowed_pages(role)
            .iter()
            .map(|p| NavEntry {
                page: *p,
                title: p.title().to_string(),
                href: p.href(),
            })
            .collect(),
    }
}

/// app_root
///
/// [Front Controller] `/app` goes to the caller's home page, or to sign-in.
#[utoipa::path(
    get,
    path = "/app",
    tag = "pages",
    responses((status = 303, description = "Redirect to home or /login"))
)]
pub async fn app_root(MaybeAuthUser(user): MaybeAuthUser) -> Redirect {
    match user {
        Some(user) => Redirect::to(&access::home_page(user.role).href()),
        None => Redirect::to("/login"),
    }
}

/// app_page
///
/// [Front Controller] Every page request goes through the role whitelist. Visitors
/// without a session are sent to sign-in with a return path; pages outside the
/// caller's whitelist send them home.
#[utoipa::path(
    get,
    path = "/app/{page}",
    tag = "pages",
    params(("page" = String, Path, description = "Page slug, e.g. my-tasks")),
    responses(
        (status = 200, description = "Page descriptor", body = PageView),
        (status = 303, description = "Redirect to /login or the home page")
    )
)]
pub async fn app_page(MaybeAuthUser(user): MaybeAuthUser, Path(slug): Path<String>) -> Response {
    let role = user.as_ref().map(|u| u.role);

    match access::resolve(role, &slug) {
        PageAccess::Granted(page) => match role {
            Some(role) => Json(page_view(role, page)).into_response(),
            None => Redirect::to("/login").into_response(),
        },
        PageAccess::Login { next } => {
            tracing::debug!(page = %slug, "page requested without a session");
            Redirect::to(&format!("/login?next={next}")).into_response()
        }
        PageAccess::Home(home) => {
            tracing::warn!(
                page = %slug,
                user_id = ?user.as_ref().map(|u| u.id),
                "page denied for role; redirecting home"
            );
            Redirect::to(&home.href()).into_response()
        }
    }
}
