// Admin viewer - the caller's page permissions, extracted per request

use axum::{extract::FromRequestParts, http::request::Parts};
use std::collections::HashSet;
use std::convert::Infallible;

use crate::error::{AppError, AppResult};

/// Header carrying the comma separated permissions granted upstream
pub const PERMISSIONS_HEADER: &str = "x-admin-permissions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PagePermission {
    EditLive,
    PutLive,
    DeleteLive,
}

impl PagePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            PagePermission::EditLive => "edit_live",
            PagePermission::PutLive => "put_live",
            PagePermission::DeleteLive => "delete_live",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "edit_live" => Some(PagePermission::EditLive),
            "put_live" => Some(PagePermission::PutLive),
            "delete_live" => Some(PagePermission::DeleteLive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminViewer {
    permissions: HashSet<PagePermission>,
    is_admin: bool,
}

impl AdminViewer {
    /// Viewer holding every page permission
    pub fn admin() -> Self {
        Self {
            permissions: HashSet::new(),
            is_admin: true,
        }
    }

    pub fn with_permissions(permissions: impl IntoIterator<Item = PagePermission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
            is_admin: false,
        }
    }

    pub fn from_header(value: &str) -> Self {
        let mut viewer = Self::default();
        for part in value.split(',') {
            if part.trim() == "admin" {
                viewer.is_admin = true;
            } else if let Some(permission) = PagePermission::parse(part) {
                viewer.permissions.insert(permission);
            }
        }
        viewer
    }

    pub fn can(&self, permission: PagePermission) -> bool {
        self.is_admin || self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: PagePermission) -> AppResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Missing page permission '{}'",
                permission.as_str()
            )))
        }
    }
}

// Requests without the header get an empty permission set
impl<S> FromRequestParts<S> for AdminViewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let viewer = parts
            .headers
            .get(PERMISSIONS_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(AdminViewer::from_header)
            .unwrap_or_default();

        async move { Ok(viewer) }
    }
}
