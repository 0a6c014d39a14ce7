//! Access control for the admin API.
//!
//! Handlers declare what they need with a [`RequiresPermission`] extractor:
//!
//! ```ignore
//! async fn list_orders(_: RequiresPermission<resource::Orders, operation::ReadAll>) { ... }
//! ```
//!
//! The admin surface is open to administrators only, so the check itself is a single admin
//! test. The resource and operation markers name what the route does; they show up in the
//! refusal message and in the handler signature. Routes that act on per-user data (such as
//! notifications) scope their queries to the caller themselves.

use std::{marker::PhantomData, ops::Deref};

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
    types::{Operation, Resource},
};

/// Type-level resource markers.
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync + 'static {
        const RESOURCE: Resource;
    }

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(
        Products,
        Orders,
        Customers,
        Coupons,
        Notifications,
        AuditLogs,
        Settings,
        Messaging,
        Reports,
        Analytics,
        Automation,
        Files,
        Backups,
        PaymentLinks,
        Security,
    );
}

/// Type-level operation markers.
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync + 'static {
        const OPERATION: Operation;
    }

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, ReadAll, UpdateAll, DeleteAll, SystemAccess);
}

/// Admit administrators; refuse everyone else with a message naming the attempted action.
pub fn require_admin(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if user.is_admin {
        return Ok(());
    }
    Err(Error::InsufficientPermissions {
        action: operation,
        resource: resource.to_string(),
    })
}

/// An authenticated administrator, admitted to perform `O` on `R`.
pub struct RequiresPermission<R, O> {
    user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R, O> RequiresPermission<R, O> {
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
