//! Role-based access control: who may call which capability, and which front-controller
//! pages each role may open.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The RBAC field stored on every user row (`admin`, `deo`, `staff`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    /// Data-entry operator.
    Deo,
    Staff,
}

/// Capability
///
/// Fine-grained permissions; roles are checked against these rather than against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageUsers,
    ManageTasks,
    WorkTasks,
    ManageClients,
    DeleteClients,
    ManagePosts,
    PublishPosts,
    RequestWithdrawals,
    ReviewWithdrawals,
    UploadFiles,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Deo => "deo",
            Role::Staff => "staff",
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Admin => !matches!(capability, WorkTasks | RequestWithdrawals),
            Role::Deo => matches!(
                capability,
                WorkTasks | ManageClients | ManagePosts | RequestWithdrawals | UploadFiles
            ),
            Role::Staff => matches!(capability, WorkTasks | RequestWithdrawals),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "deo" => Ok(Role::Deo),
            "staff" => Ok(Role::Staff),
            _ => Err(()),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map_err(|_| format!("unknown role '{value}'"))
    }
}

/// Page
///
/// Every screen reachable through the `/app/{page}` front controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum Page {
    Dashboard,
    Users,
    Tasks,
    MyTasks,
    Clients,
    Posts,
    Withdrawals,
    Profile,
}

const ADMIN_PAGES: &[Page] = &[
    Page::Dashboard,
    Page::Users,
    Page::Tasks,
    Page::Clients,
    Page::Posts,
    Page::Withdrawals,
    Page::Profile,
];

const DEO_PAGES: &[Page] = &[
    Page::Dashboard,
    Page::MyTasks,
    Page::Clients,
    Page::Posts,
    Page::Withdrawals,
    Page::Profile,
];

const STAFF_PAGES: &[Page] = &[
    Page::Dashboard,
    Page::MyTasks,
    Page::Withdrawals,
    Page::Profile,
];

impl Page {
    pub fn slug(&self) -> &'static str {
        match self {
            Page::Dashboard => "dashboard",
            Page::Users => "users",
            Page::Tasks => "tasks",
            Page::MyTasks => "my-tasks",
            Page::Clients => "clients",
            Page::Posts => "posts",
            Page::Withdrawals => "withdrawals",
            Page::Profile => "profile",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Page> {
        [
            Page::Dashboard,
            Page::Users,
            Page::Tasks,
            Page::MyTasks,
            Page::Clients,
            Page::Posts,
            Page::Withdrawals,
            Page::Profile,
        ]
        .into_iter()
        .find(|page| page.slug() == slug)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Users => "Users",
            Page::Tasks => "Tasks",
            Page::MyTasks => "My Tasks",
            Page::Clients => "Clients",
            Page::Posts => "Recruitment Posts",
            Page::Withdrawals => "Withdrawals",
            Page::Profile => "Profile",
        }
    }

    pub fn href(&self) -> String {
        format!("/app/{}", self.slug())
    }
}

/// The whitelist of pages a role may open, in navigation order.
pub fn allowed_pages(role: Role) -> &'static [Page] {
    match role {
        Role::Admin => ADMIN_PAGES,
        Role::Deo => DEO_PAGES,
        Role::Staff => STAFF_PAGES,
    }
}

/// Landing page after sign-in and the fallback target for denied pages.
pub fn home_page(_role: Role) -> Page {
    Page::Dashboard
}

/// Outcome of routing a page request through the whitelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAccess {
    Granted(Page),
    /// No session: send the visitor to the login page, remembering where they were going.
    Login { next: String },
    /// Unknown or forbidden page: send the user back to their home page.
    Home(Page),
}

/// resolve
///
/// Routes a page request. Only known slugs are carried into the login `next`
/// target, so it never needs escaping.
pub fn resolve(role: Option<Role>, slug: &str) -> PageAccess {
    let page = Page::from_slug(slug);
    let Some(role) = role else {
        return PageAccess::Login {
            next: page.map(|p| p.href()).unwrap_or_else(|| "/app".to_string()),
        };
    };

    match page {
        Some(page) if allowed_pages(role).contains(&page) => PageAccess::Granted(page),
        _ => PageAccess::Home(home_page(role)),
    }
}

/// The API path a page pulls its data from for the given role.
pub fn data_endpoint(role: Role, page: Page) -> &'static str {
    match page {
        Page::Dashboard => "/dashboard",
        Page::Users => "/admin/users",
        Page::Tasks => "/admin/tasks",
        Page::MyTasks => "/tasks/mine",
        Page::Clients => "/clients",
        Page::Posts => "/manage/posts",
        Page::Withdrawals if role == Role::Admin => "/admin/withdrawals",
        Page::Withdrawals => "/withdrawals/mine",
        Page::Profile => "/me",
    }
}

/// sanitize_next
///
/// Accepts a post-login redirect target only if it stays on this site under `/app/`.
pub fn sanitize_next(next: &str) -> Option<String> {
    let next = next.trim();
    if !next.starts_with("/app/") && next != "/app" {
        return None;
    }
    if next.starts_with("//") || next.contains('\\') || next.contains("://") {
        return None;
    }
    let path = next.split(['?', '#']).next().unwrap_or(next);
    if path.split('/').any(|segment| segment == ".." || segment == ".") {
        return None;
    }
    if next.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(next.to_string())
}
