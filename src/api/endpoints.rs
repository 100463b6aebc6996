//! Paths of the messaging API, relative to the configured base URL.

pub mod auth {
    pub const LOGIN: &str = "/auth/login/";
    pub const SIGNUP: &str = "/auth/signup/";
    pub const VERIFY_EMAIL: &str = "/auth/verify_email/";
    pub const RESEND_VERIFICATION_CODE: &str = "/auth/resend_verification_code/";
    pub const CSRF_TOKEN: &str = "/auth/csrf_token/";
    pub const SEND_RESET_EMAIL: &str = "/auth/send_reset_password_email/";
    pub const RESET_PASSWORD: &str = "/auth/reset_password/";
    pub const HEALTH_CHECK: &str = "/auth/test/";
}

pub mod messaging {
    pub const SEND_MESSAGE: &str = "/messaging/send/";
    pub const GET_CONVERSATIONS: &str = "/messaging/conversations/";
    pub const GET_MESSAGES: &str = "/messaging/messages/";
}
