//! Form schemas and validation
//!
//! A form is an ordered list of fields, each with a kind and a validator
//! chain. [`validate`] interprets any schema against submitted
//! `application/x-www-form-urlencoded` pairs.

pub mod csrf;

use std::collections::BTreeMap;

/// How a field is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Password,
    Hidden,
    Submit,
}

impl FieldKind {
    /// The `<input type=...>` attribute
    pub const fn input_type(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Password => "password",
            Self::Hidden => "hidden",
            Self::Submit => "submit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Value must contain something other than whitespace. Stops the chain.
    DataRequired { message: &'static str },
    /// Field must be present in the submission and non-empty. Stops the chain.
    InputRequired { message: &'static str },
    Email { message: &'static str },
    /// Length in characters; `max` of `None` means unbounded
    Length {
        min: usize,
        max: Option<usize>,
        message: String,
    },
    /// Value must equal the value of another field
    EqualTo {
        other: &'static str,
        message: &'static str,
    },
}

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const EMAIL_MESSAGE: &str = "Invalid email address.";

impl Validator {
    pub const fn data_required() -> Self {
        Self::DataRequired {
            message: REQUIRED_MESSAGE,
        }
    }

    pub const fn input_required() -> Self {
        Self::InputRequired {
            message: REQUIRED_MESSAGE,
        }
    }

    pub const fn email() -> Self {
        Self::Email {
            message: EMAIL_MESSAGE,
        }
    }

    const fn stops_chain(&self) -> bool {
        matches!(self, Self::DataRequired { .. } | Self::InputRequired { .. })
    }

    /// `None` when the value passes
    fn check(&self, value: Option<&str>, data: &BTreeMap<String, String>) -> Option<String> {
        let text = value.unwrap_or("");
        let failed = match self {
            Self::DataRequired { .. } => text.trim().is_empty(),
            Self::InputRequired { .. } => value.map_or(true, str::is_empty),
            Self::Email { .. } => !is_email(text),
            Self::Length { min, max, .. } => {
                let len = text.chars().count();
                len < *min || max.is_some_and(|max| len > max)
            }
            Self::EqualTo { other, .. } => data.get(*other).map_or("", String::as_str) != text,
        };
        failed.then(|| self.message().to_string())
    }

    fn message(&self) -> &str {
        match self {
            Self::DataRequired { message }
            | Self::InputRequired { message }
            | Self::Email { message }
            | Self::EqualTo { message, .. } => *message,
            Self::Length { message, .. } => message.as_str(),
        }
    }
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub validators: Vec<Validator>,
}

impl Field {
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            validators: Vec::new(),
        }
    }

    #[must_use]
    pub fn validate_with(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }
}

/// Ordered field list
#[derive(Debug, Clone, Default)]
pub struct FormSchema {
    pub fields: Vec<Field>,
}

impl FormSchema {
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// Validated values keyed by field name (submit fields excluded)
pub type FormValues = BTreeMap<String, String>;

/// Validation failures in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((field.to_string(), vec![message])),
        }
    }

    pub fn for_field(&self, field: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }
}

/// Collapse submitted pairs to one value per name; the first occurrence wins
pub fn collect_pairs(pairs: &[(String, String)]) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    for (name, value) in pairs {
        data.entry(name.clone()).or_insert_with(|| value.clone());
    }
    data
}

/// Run every field's validator chain in schema order.
pub fn validate(schema: &FormSchema, pairs: &[(String, String)]) -> Result<FormValues, FieldErrors> {
    let data = collect_pairs(pairs);
    let mut values = FormValues::new();
    let mut errors = FieldErrors::default();

    for field in &schema.fields {
        if field.kind == FieldKind::Submit {
            continue;
        }
        let value = data.get(field.name).map(String::as_str);
        for validator in &field.validators {
            if let Some(message) = validator.check(value, &data) {
                errors.add(field.name, message);
                if validator.stops_chain() {
                    break;
                }
            }
        }
        values.insert(field.name.to_string(), value.unwrap_or("").to_string());
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

/// The name form shown on `/form` and `/usersession`
pub fn name_form() -> FormSchema {
    FormSchema::default()
        .field(
            Field::new("name", "What's your name?", FieldKind::Text)
                .validate_with(Validator::data_required())
                .validate_with(Validator::input_required()),
        )
        .field(
            Field::new("email", "What's your email?", FieldKind::Text)
                .validate_with(Validator::email()),
        )
        .field(
            Field::new("password", "Pass: ", FieldKind::Password).validate_with(
                Validator::Length {
                    min: 1,
                    max: None,
                    message: "Password should be at least 1 characters long".to_string(),
                },
            ),
        )
        .field(
            Field::new("confirm_password", "Confirm Password", FieldKind::Password)
                .validate_with(Validator::EqualTo {
                    other: "password",
                    message: "Both password fields must be equal!",
                }),
        )
        .field(Field::new("submit", "Submit", FieldKind::Submit))
}

/// One field as a template sees it
#[derive(Debug, Clone)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub errors: Vec<String>,
}

/// A whole form ready for rendering
#[derive(Debug, Clone)]
pub struct FormView {
    pub fields: Vec<FieldView>,
    /// Hidden CSRF token, when protection is on
    pub csrf_token: Option<String>,
}

impl FormView {
    /// Field values are taken from `values`; password fields are never echoed
    pub fn new(
        schema: &FormSchema,
        values: &BTreeMap<String, String>,
        errors: &FieldErrors,
        csrf_token: Option<String>,
    ) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|field| FieldView {
                name: field.name,
                label: field.label,
                input_type: field.kind.input_type(),
                value: match field.kind {
                    FieldKind::Password => String::new(),
                    FieldKind::Submit => field.label.to_string(),
                    FieldKind::Text | FieldKind::Hidden => {
                        values.get(field.name).cloned().unwrap_or_default()
                    }
                },
                errors: errors.for_field(field.name).to_vec(),
            })
            .collect();
        Self { fields, csrf_token }
    }

    /// A blank form
    pub fn empty(schema: &FormSchema, csrf_token: Option<String>) -> Self {
        Self::new(schema, &BTreeMap::new(), &FieldErrors::default(), csrf_token)
    }

    pub fn has_errors(&self) -> bool {
        self.fields.iter().any(|f| !f.errors.is_empty())
    }
}
