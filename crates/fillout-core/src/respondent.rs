use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Respondent key template \"{0}\" has no % placeholder")]
    MissingPlaceholder(String),

    #[error("Respondent key template \"{template}\" has an invalid placeholder at byte {position}, expected %d or %0<width>d")]
    InvalidPlaceholder { template: String, position: usize },

    #[error("Respondent key template \"{0}\" has more than one placeholder")]
    MultiplePlaceholders(String),
}

/// `printf`-style template turning a session index into a respondent key,
/// e.g. `resp-%04d` gives `resp-0007` for session 7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespondentKeyTemplate {
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl RespondentKeyTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let Some(start) = template.find('%') else {
            return Err(TemplateError::MissingPlaceholder(template.to_string()));
        };

        let directive = &template[start + 1..];
        let zero_pad = directive.starts_with('0');
        let digits_start = usize::from(zero_pad);
        let digits_len = directive[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let conversion = digits_start + digits_len;

        if directive.as_bytes().get(conversion) != Some(&b'd') {
            return Err(TemplateError::InvalidPlaceholder {
                template: template.to_string(),
                position: start,
            });
        }

        let width = if digits_len == 0 {
            0
        } else {
            directive[digits_start..conversion].parse().map_err(|_| {
                TemplateError::InvalidPlaceholder {
                    template: template.to_string(),
                    position: start,
                }
            })?
        };

        let suffix = &directive[conversion + 1..];
        if suffix.contains('%') {
            return Err(TemplateError::MultiplePlaceholders(template.to_string()));
        }

        Ok(Self {
            prefix: template[..start].to_string(),
            suffix: suffix.to_string(),
            width,
            zero_pad,
        })
    }

    /// Key for the session with the given zero-based index
    pub fn key(&self, index: usize) -> String {
        let number = if self.zero_pad {
            format!("{:0width$}", index, width = self.width)
        } else {
            format!("{:>width$}", index, width = self.width)
        };
        format!("{}{}{}", self.prefix, number, self.suffix)
    }

    /// Append the key for `index` to the path of `url`
    pub fn apply(&self, url: &str, index: usize) -> String {
        let mut personal = url.to_string();
        if !personal.ends_with('/') {
            personal.push('/');
        }
        personal.push_str(&self.key(index));
        personal
    }
}

impl FromStr for RespondentKeyTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RespondentKeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.prefix)?;
        if self.zero_pad {
            write!(f, "0")?;
        }
        if self.width > 0 {
            write!(f, "{}", self.width)?;
        }
        write!(f, "d{}", self.suffix)
    }
}
