use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub csrf_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(csrf_secret: SecretString) -> Self {
        Self { csrf_secret }
    }
}
