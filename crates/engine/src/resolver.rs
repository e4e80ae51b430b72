//! Recipient resolver: turns a filtered contact population into the final
//! recipient list.
//!
//! Every contact is reduced to its canonical email (first comma segment,
//! trimmed, lower-cased). Contacts without a usable email are skipped, not
//! reported. The selection mode then decides how the operator's explicit
//! selection combines with the population:
//! - `All`: every canonical email, explicit selection ignored
//! - `Include`: only the selected emails that occur in the population
//! - `Exclude`: the population minus the selected emails
//!
//! Output order always follows the population, and the first contact to
//! claim an email provides its display name.

use std::collections::HashSet;

use cardmail_common::types::{CanonicalEmail, ContactRecord, RecipientSet, SelectionMode};

/// Stateless recipient resolver.
pub struct RecipientResolver;

impl RecipientResolver {
    pub fn resolve(
        population: &[ContactRecord],
        mode: SelectionMode,
        explicit_selection: &HashSet<CanonicalEmail>,
    ) -> RecipientSet {
        let mut recipients = RecipientSet::new();
        let mut skipped = 0usize;

        for contact in population {
            let Some(email) = contact.canonical_email() else {
                skipped += 1;
                continue;
            };

            let keep = match mode {
                SelectionMode::All => true,
                SelectionMode::Include => explicit_selection.contains(&email),
                SelectionMode::Exclude => !explicit_selection.contains(&email),
            };

            if keep && !recipients.contains(&email) {
                recipients.insert(email, contact.display_name());
            }
        }

        if skipped > 0 {
            tracing::debug!(
                skipped,
                population = population.len(),
                "Contacts without a usable email were left out"
            );
        }

        recipients
    }

    /// Deduplicated canonical emails of a population, in population order.
    pub fn canonical_emails(population: &[ContactRecord]) -> Vec<CanonicalEmail> {
        Self::resolve(population, SelectionMode::All, &HashSet::new())
            .emails()
            .cloned()
            .collect()
    }
}
