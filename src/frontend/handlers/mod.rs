mod authenticated;
mod unauthenticated;

pub(crate) use authenticated::handle_authenticated;
pub(crate) use unauthenticated::handle_unauthenticated;
