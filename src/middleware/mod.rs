pub mod csrf;
pub mod session;

pub use csrf::{csrf_protect, csrf_token};
pub use session::{
    authenticate_user, end_session, get_current_user, require_admin, require_user,
    start_session, CurrentUser,
};
