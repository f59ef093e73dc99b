use crate::models::Role;
use crate::routes::Route;

use super::session::AuthState;

/// Outcome of guarding a protected view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Startup restore still running; show a neutral placeholder.
    Loading,
    Redirect(Route),
    Render,
}

/// Role-based access check for protected views.
pub struct SessionGate;

impl SessionGate {
    /// Unauthenticated users and users without one of `required_roles` are
    /// both sent to the login entry point; there is no separate forbidden view.
    pub fn guard(required_roles: &[Role], state: &AuthState) -> GateDecision {
        if state.loading {
            return GateDecision::Loading;
        }

        let Some(user) = state.user.as_ref().filter(|_| state.is_authenticated) else {
            return GateDecision::Redirect(Route::Login);
        };

        if !user.has_role(required_roles) {
            return GateDecision::Redirect(Route::Login);
        }

        GateDecision::Render
    }

    /// Guard a route from the route table. Public routes always render.
    pub fn guard_route(route: Route, state: &AuthState) -> GateDecision {
        if route.is_protected() {
            Self::guard(route.required_roles(), state)
        } else {
            GateDecision::Render
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserIdentity;

    fn state_with(role: Role) -> AuthState {
        AuthState {
            loading: false,
            is_authenticated: true,
            user: Some(UserIdentity {
                id: 11,
                number_id: "80123456".to_string(),
                full_name: "Jorge Méndez".to_string(),
                email: "jorge@obra.co".to_string(),
                role,
            }),
            token: Some("tok".to_string()),
        }
    }

    #[test]
    fn test_operator_gating() {
        let state = state_with(Role::Operador);
        assert_eq!(
            SessionGate::guard(&[Role::Administrador], &state),
            GateDecision::Redirect(Route::Login)
        );
        assert_eq!(SessionGate::guard(&[Role::Operador], &state), GateDecision::Render);
    }

    #[test]
    fn test_any_of_several_roles() {
        let state = state_with(Role::Supervisor);
        assert_eq!(
            SessionGate::guard(&[Role::Administrador, Role::Supervisor], &state),
            GateDecision::Render
        );
    }

    #[test]
    fn test_loading_never_redirects() {
        let state = AuthState {
            loading: true,
            ..AuthState::default()
        };
        assert_eq!(SessionGate::guard(&[Role::Operador], &state), GateDecision::Loading);
    }

    #[test]
    fn test_unauthenticated_redirects() {
        let state = AuthState::default();
        assert_eq!(
            SessionGate::guard(&[Role::Operador], &state),
            GateDecision::Redirect(Route::Login)
        );
    }

    #[test]
    fn test_authenticated_flag_without_user_redirects() {
        let state = AuthState {
            loading: false,
            is_authenticated: true,
            user: None,
            token: Some("tok".to_string()),
        };
        assert_eq!(
            SessionGate::guard(&[Role::Operador], &state),
            GateDecision::Redirect(Route::Login)
        );
    }

    #[test]
    fn test_empty_role_set_redirects() {
        let state = state_with(Role::Administrador);
        assert_eq!(
            SessionGate::guard(&[], &state),
            GateDecision::Redirect(Route::Login)
        );
    }

    #[test]
    fn test_guard_route() {
        let state = state_with(Role::Supervisor);
        assert_eq!(SessionGate::guard_route(Route::Supervisor, &state), GateDecision::Render);
        assert_eq!(
            SessionGate::guard_route(Route::Admin, &state),
            GateDecision::Redirect(Route::Login)
        );
        assert_eq!(
            SessionGate::guard_route(Route::Login, &AuthState::default()),
            GateDecision::Render
        );
    }
}
