use lighthouse_core::InvalidNameError;
use lighthouse_core::traits::NameValidator;

/// Accepts names made of ASCII letters, digits and `-`
#[derive(Debug, Clone, Copy, Default)]
pub struct UriNameValidator;

impl UriNameValidator {
    pub fn new() -> Self {
        Self
    }
}

impl NameValidator for UriNameValidator {
    fn validate_name(&self, name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::new(name, "name is empty"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
        {
            return Err(InvalidNameError::new(
                name,
                format!("character {:?} is not allowed in a URI", c),
            ));
        }
        Ok(())
    }
}
