//! Spanish message bodies for account emails.

use super::traits::MailMessage;
use crate::lifecycle::{code_ttl, reset_token_ttl};

pub fn verification_code(to: &str, code: &str) -> MailMessage {
    let minutes = code_ttl().num_minutes();
    MailMessage {
        to: to.to_string(),
        subject: "Tu código de verificación".into(),
        text: format!(
            "Hola,\n\nTu código de verificación es: {code}\n\n\
             El código expira en {minutes} minutos. Si no creaste una cuenta, ignora este mensaje.\n"
        ),
        html: Some(format!(
            "<p>Hola,</p>\
             <p>Tu código de verificación es: <strong style=\"letter-spacing:4px\">{code}</strong></p>\
             <p>El código expira en {minutes} minutos. Si no creaste una cuenta, ignora este mensaje.</p>"
        )),
    }
}

pub fn password_reset(to: &str, link: &str) -> MailMessage {
    let minutes = reset_token_ttl().num_minutes();
    MailMessage {
        to: to.to_string(),
        subject: "Restablece tu contraseña".into(),
        text: format!(
            "Hola,\n\nRecibimos una solicitud para restablecer tu contraseña.\n\
             Abre este enlace para elegir una nueva: {link}\n\n\
             El enlace expira en {minutes} minutos. Si no lo solicitaste, ignora este mensaje.\n"
        ),
        html: Some(format!(
            "<p>Hola,</p>\
             <p>Recibimos una solicitud para restablecer tu contraseña.</p>\
             <p><a href=\"{link}\">Elegir una nueva contraseña</a></p>\
             <p>El enlace expira en {minutes} minutos. Si no lo solicitaste, ignora este mensaje.</p>"
        )),
    }
}
