use secrecy::SecretString;

/// Signing material shared across the server, kept out of `Action` so it is
/// never logged alongside the rest of the arguments.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(access_secret: SecretString, refresh_secret: SecretString) -> Self {
        Self {
            access_secret,
            refresh_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new("access".into(), "refresh".into());
        assert_eq!(args.access_secret.expose_secret(), "access");
        assert_eq!(args.refresh_secret.expose_secret(), "refresh");
    }
}
