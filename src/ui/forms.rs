use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::error::ValidationError;
use crate::models::{CopySummary, InventoryUpdate, User};
use crate::validation::{
    blank_values, parse_non_negative, validate, FieldKind, FieldSpec, Validation,
};

/// Modal create/edit form driven by a descriptor list. The same state backs
/// both the book and the user form.
#[derive(Clone)]
pub(crate) struct FormState {
    pub(crate) specs: &'static [FieldSpec],
    pub(crate) values: Vec<String>,
    pub(crate) active: usize,
    /// Fields currently marked as failing.
    pub(crate) invalid: Vec<&'static str>,
    pub(crate) error: Option<String>,
    /// Id of the row being edited; `None` while creating.
    pub(crate) editing: Option<i64>,
}

impl FormState {
    /// Empty form populated with descriptor defaults.
    pub(crate) fn blank(specs: &'static [FieldSpec]) -> Self {
        Self {
            specs,
            values: blank_values(specs),
            active: 0,
            invalid: Vec::new(),
            error: None,
            editing: None,
        }
    }

    /// Populate the form from an existing row when editing.
    pub(crate) fn for_edit(specs: &'static [FieldSpec], id: i64, values: Vec<String>) -> Self {
        Self {
            values,
            editing: Some(id),
            ..Self::blank(specs)
        }
    }

    /// Reset every field to its default and forget the edited row.
    pub(crate) fn clear(&mut self) {
        self.values = blank_values(self.specs);
        self.active = 0;
        self.invalid.clear();
        self.error = None;
        self.editing = None;
    }

    pub(crate) fn next_field(&mut self) {
        self.active = (self.active + 1) % self.specs.len();
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = (self.active + self.specs.len() - 1) % self.specs.len();
    }

    fn active_spec(&self) -> &FieldSpec {
        &self.specs[self.active]
    }

    /// Type into the active field. Choice fields only change through
    /// `cycle_choice`.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() || matches!(self.active_spec().kind, FieldKind::Choice(_)) {
            return false;
        }
        self.values[self.active].push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        if !matches!(self.active_spec().kind, FieldKind::Choice(_)) {
            self.values[self.active].pop();
        }
    }

    /// Step the active choice field forward or backward through its options.
    pub(crate) fn cycle_choice(&mut self, forward: bool) {
        let FieldKind::Choice(options) = self.active_spec().kind else {
            return;
        };
        let current = options
            .iter()
            .position(|option| *option == self.values[self.active])
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % options.len()
        } else {
            (current + options.len() - 1) % options.len()
        };
        self.values[self.active] = options[next].to_string();
    }

    /// Clear previous marks, validate, and mark every failing field.
    pub(crate) fn validate(&mut self) -> Validation {
        self.invalid.clear();
        self.error = None;
        let validation = validate(self.specs, &self.values);
        self.invalid = validation.errors.clone();
        validation
    }

    /// Mark fields flagged after validation, e.g. by a uniqueness failure.
    pub(crate) fn mark(&mut self, fields: Vec<&'static str>, message: String) {
        if let Some(first) = fields
            .first()
            .and_then(|name| self.specs.iter().position(|spec| spec.name == *name))
        {
            self.active = first;
        }
        self.invalid = fields;
        self.error = Some(message);
    }

    pub(crate) fn is_invalid(&self, name: &str) -> bool {
        self.invalid.iter().any(|field| *field == name)
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, idx: usize) -> Line<'static> {
        let spec = &self.specs[idx];
        let value = &self.values[idx];
        let is_active = idx == self.active;
        let invalid = self.is_invalid(spec.name);

        let display = match spec.kind {
            FieldKind::Choice(_) => format!("< {value} >"),
            _ if value.is_empty() && spec.required => "<required>".to_string(),
            _ if value.is_empty() => "<optional>".to_string(),
            _ => value.clone(),
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        let label_style = if invalid {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let marker = if invalid { "! " } else { "  " };

        Line::from(vec![
            Span::styled(format!("{marker}{}: ", spec.label), label_style),
            Span::styled(display, style),
        ])
    }

    /// Column where the cursor sits for the active field.
    pub(crate) fn cursor_offset(&self) -> u16 {
        let spec = self.active_spec();
        let prefix = spec.label.chars().count() + 4;
        let value = self.values[self.active].chars().count();
        match spec.kind {
            FieldKind::Choice(_) => (prefix + 2) as u16,
            _ => (prefix + value) as u16,
        }
    }
}

/// Labels shown in the inventory dialog, in counter order.
pub(crate) const INVENTORY_LABELS: [&str; 4] = ["Available", "Lent", "Missing", "Damaged"];

/// Inventory editing dialog for one book.
pub(crate) struct InventoryForm {
    pub(crate) book_id: i64,
    pub(crate) title: String,
    pub(crate) loaded: CopySummary,
    pub(crate) values: [String; 4],
    pub(crate) active: usize,
    pub(crate) error: Option<String>,
}

impl InventoryForm {
    pub(crate) fn new(book_id: i64, title: String, summary: CopySummary) -> Self {
        Self {
            book_id,
            title,
            loaded: summary,
            values: [
                summary.available.to_string(),
                summary.lent.to_string(),
                summary.missing.to_string(),
                summary.damaged.to_string(),
            ],
            active: 0,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = (self.active + 1) % INVENTORY_LABELS.len();
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = (self.active + INVENTORY_LABELS.len() - 1) % INVENTORY_LABELS.len();
    }

    /// Counters only accept digits.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_ascii_digit() {
            self.values[self.active].push(ch);
            true
        } else {
            false
        }
    }

    pub(crate) fn backspace(&mut self) {
        self.values[self.active].pop();
    }

    /// Build a partial update holding only counters the user changed. Blank
    /// fields leave the stored counter alone.
    pub(crate) fn to_update(&self) -> Result<InventoryUpdate, ValidationError> {
        let loaded = [
            self.loaded.available,
            self.loaded.lent,
            self.loaded.missing,
            self.loaded.damaged,
        ];
        let mut parsed = [None; 4];
        let mut invalid = Vec::new();

        for (idx, raw) in self.values.iter().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            match parse_non_negative(raw) {
                Some(value) if value != loaded[idx] => parsed[idx] = Some(value),
                Some(_) => {}
                None => invalid.push(INVENTORY_FIELD_NAMES[idx]),
            }
        }

        if !invalid.is_empty() {
            return Err(ValidationError::new(invalid));
        }
        Ok(InventoryUpdate {
            available: parsed[0],
            lent: parsed[1],
            missing: parsed[2],
            damaged: parsed[3],
        })
    }

    /// Running total of the values currently typed in.
    pub(crate) fn preview_total(&self) -> i64 {
        self.values
            .iter()
            .filter_map(|raw| parse_non_negative(raw))
            .fold(0i64, i64::saturating_add)
    }
}

const INVENTORY_FIELD_NAMES: [&str; 4] = ["available", "lent", "missing", "damaged"];

/// State for confirming permanent user deletion.
#[derive(Clone)]
pub(crate) struct ConfirmUserDelete {
    pub(crate) id: i64,
    pub(crate) label: String,
}

impl From<&User> for ConfirmUserDelete {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            label: user.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{BOOK_FIELDS, USER_FIELDS};

    #[test]
    fn revalidation_clears_previous_marks() {
        let mut form = FormState::blank(BOOK_FIELDS);
        let validation = form.validate();
        assert_eq!(validation.errors, vec!["book_number", "title", "author"]);
        assert!(form.is_invalid("title"));

        form.values[0] = "12".into();
        form.values[1] = "Emma".into();
        form.values[2] = "Jane Austen".into();
        assert!(form.validate().is_valid());
        assert!(form.invalid.is_empty());
    }

    #[test]
    fn choice_fields_cycle_and_ignore_typing() {
        let mut form = FormState::blank(USER_FIELDS);
        form.active = 3;
        assert!(!form.push_char('x'));
        form.cycle_choice(true);
        assert_eq!(form.values[3], "Premium");
        form.cycle_choice(false);
        form.cycle_choice(false);
        assert_eq!(form.values[3], "Staff");
    }

    #[test]
    fn mark_focuses_the_first_flagged_field() {
        let mut form = FormState::blank(USER_FIELDS);
        form.mark(vec!["email"], "taken".into());
        assert_eq!(form.active, 1);
        assert_eq!(form.error.as_deref(), Some("taken"));
    }

    #[test]
    fn clear_forgets_the_edited_row() {
        let mut form = FormState::for_edit(USER_FIELDS, 4, vec!["Ada".into(); 5]);
        form.clear();
        assert_eq!(form.editing, None);
        assert_eq!(form.values, blank_values(USER_FIELDS));
    }

    #[test]
    fn inventory_update_only_sends_changed_counters() {
        let mut form = InventoryForm::new(1, "Emma".into(), CopySummary::new(1, 0, 0, 0));
        form.values[1] = "2".into();
        form.values[3] = String::new();
        let update = form.to_update().unwrap();
        assert_eq!(
            update,
            InventoryUpdate {
                lent: Some(2),
                ..Default::default()
            }
        );
        assert_eq!(form.preview_total(), 3);
    }

    #[test]
    fn preview_total_saturates_on_huge_input() {
        let mut form = InventoryForm::new(1, "Emma".into(), CopySummary::default());
        form.values[0] = i64::MAX.to_string();
        form.values[1] = "1".into();
        assert_eq!(form.preview_total(), i64::MAX);
    }
}
