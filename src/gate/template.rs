//! Challenge page rendering.
//!
//! Login pages are HTML with a small set of `{{ }}` actions, enough for a
//! login form:
//!
//! - `{{.Title}}` / `{{.Message}}` substitute the (HTML-escaped) page fields.
//! - `{{if .Message}}...{{else}}...{{end}}` picks a branch on a non-empty field.
//! - `{{/* ... */}}` is a comment.

use super::error::TemplateError;

pub const DEFAULT_TITLE: &str = "Password Protected";
pub const INVALID_PASSWORD_MESSAGE: &str = "Invalid password. Please try again.";

/// Per-response values fed into the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPage {
    pub title: String,
    pub message: String,
}

impl LoginPage {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: String::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Message => &self.message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Message,
}

impl Field {
    fn parse(name: &str) -> Result<Self, TemplateError> {
        match name {
            ".Title" => Ok(Self::Title),
            ".Message" => Ok(Self::Message),
            other => Err(TemplateError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field(Field),
    If {
        field: Field,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

// Open `{{if}}` block while parsing; the root frame has no field.
#[derive(Debug, Default)]
struct Frame {
    field: Option<Field>,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Frame {
    fn nodes(&mut self) -> &mut Vec<Node> {
        match self.otherwise.as_mut() {
            Some(otherwise) => otherwise,
            None => &mut self.then,
        }
    }
}

/// A parsed login page, immutable and shared by all requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTemplate {
    nodes: Vec<Node>,
}

impl LoginTemplate {
    /// Parse raw template bytes.
    ///
    /// # Errors
    /// Returns a [`TemplateError`] when the bytes are not UTF-8 or an action is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let source = std::str::from_utf8(bytes).map_err(|_| TemplateError::Encoding)?;
        Self::parse(source)
    }

    /// # Errors
    /// Returns a [`TemplateError`] when an action is malformed or blocks are unbalanced.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut stack = vec![Frame::default()];
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            push_text(&mut stack, &rest[..start]);

            let body = &rest[start + 2..];
            let end = body
                .find("}}")
                .ok_or(TemplateError::UnclosedAction(offset + start))?;
            apply_action(&mut stack, &body[..end], offset + start)?;

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        push_text(&mut stack, rest);

        match stack.pop() {
            Some(root) if stack.is_empty() => Ok(Self { nodes: root.then }),
            _ => Err(TemplateError::UnclosedIf),
        }
    }

    #[must_use]
    pub fn render(&self, page: &LoginPage) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, page, &mut out);
        out
    }
}

fn push_text(stack: &mut [Frame], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(frame) = stack.last_mut() {
        frame.nodes().push(Node::Text(text.to_string()));
    }
}

fn apply_action(stack: &mut Vec<Frame>, action: &str, at: usize) -> Result<(), TemplateError> {
    let action = action.trim();
    if action.starts_with("/*") && action.ends_with("*/") {
        return Ok(());
    }

    let mut words = action.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (None, _, _) => Err(TemplateError::EmptyAction(at)),
        (Some("if"), Some(name), None) => {
            stack.push(Frame {
                field: Some(Field::parse(name)?),
                ..Frame::default()
            });
            Ok(())
        }
        (Some("else"), None, None) => match stack.last_mut() {
            Some(frame) if frame.field.is_some() && frame.otherwise.is_none() => {
                frame.otherwise = Some(Vec::new());
                Ok(())
            }
            _ => Err(TemplateError::Unexpected("else")),
        },
        (Some("end"), None, None) => {
            if stack.len() < 2 {
                return Err(TemplateError::Unexpected("end"));
            }
            let frame = stack.pop().ok_or(TemplateError::Unexpected("end"))?;
            let field = frame.field.ok_or(TemplateError::Unexpected("end"))?;
            let node = Node::If {
                field,
                then: frame.then,
                otherwise: frame.otherwise.unwrap_or_default(),
            };
            if let Some(parent) = stack.last_mut() {
                parent.nodes().push(node);
            }
            Ok(())
        }
        (Some(name), None, None) if name.starts_with('.') => {
            let field = Field::parse(name)?;
            if let Some(frame) = stack.last_mut() {
                frame.nodes().push(Node::Field(field));
            }
            Ok(())
        }
        _ => Err(TemplateError::UnsupportedAction(action.to_string())),
    }
}

fn render_nodes(nodes: &[Node], page: &LoginPage, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(field) => html_escape_into(page.field(*field), out),
            Node::If {
                field,
                then,
                otherwise,
            } => {
                let branch = if page.field(*field).is_empty() {
                    otherwise
                } else {
                    then
                };
                render_nodes(branch, page, out);
            }
        }
    }
}

fn html_escape_into(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
