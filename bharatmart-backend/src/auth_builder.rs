use bharatmart_auth::JwtAuthenticator;

/// Metadata about the signing key for logging purposes.
pub struct AuthKeyInfo {
    pub mode: &'static str,
    pub bits: usize,
}

/// Build the HS256 token issuer from config.
///
/// Outside production a missing secret is replaced by a random one, so
/// tokens do not survive a restart.
pub fn build_authenticator_from_config(
    cfg: &bharatmart_config::Config,
) -> Result<(JwtAuthenticator, AuthKeyInfo), String> {
    let access = cfg.auth.access_ttl().map_err(|e| e.to_string())?;
    let refresh = cfg.auth.refresh_ttl().map_err(|e| e.to_string())?;

    let (secret, mode) = match cfg.auth.jwt_secret.as_deref() {
        Some(s) if !s.is_empty() => (s.to_owned(), "HS256(secret)"),
        _ if cfg.is_production() => {
            return Err("no JWT configuration found: set JWT_SECRET".into());
        }
        _ => {
            tracing::warn!("JWT_SECRET not set; using an ephemeral development secret");
            (
                format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple()),
                "HS256(ephemeral)",
            )
        }
    };

    let info = AuthKeyInfo {
        mode,
        bits: secret.len() * 8,
    };
    Ok((
        JwtAuthenticator::new_hs256(secret).with_ttls(access, refresh),
        info,
    ))
}
