//! Read-only, filterable view over captured contacts.
//!
//! The catalog keeps the full contact list plus the currently filtered
//! population. Filtering follows the capture workflow: picking an operator
//! name lists the events recorded under it (contacts stay unfiltered);
//! picking one of those events narrows the population to that batch.

use std::sync::Arc;

use cardmail_common::error::{AppError, ValidationFailure};
use cardmail_common::types::{
    Batch, ContactRecord, EventSummary, SearchFilter, SearchKind, SearchRecord,
};

use crate::api::CardscanApi;

pub struct ContactCatalog {
    api: Arc<dyn CardscanApi>,
    names: Vec<String>,
    all_contacts: Vec<ContactRecord>,
    population: Vec<ContactRecord>,
    selected_name: Option<String>,
    events: Vec<EventSummary>,
    selected_event: Option<EventSummary>,
}

impl ContactCatalog {
    pub fn new(api: Arc<dyn CardscanApi>) -> Self {
        Self {
            api,
            names: Vec::new(),
            all_contacts: Vec::new(),
            population: Vec::new(),
            selected_name: None,
            events: Vec::new(),
            selected_event: None,
        }
    }

    /// Fetch names and the full contact list; clears any filter.
    pub async fn load(&mut self) -> Result<(), AppError> {
        let names = self.api.list_names().await.map_err(AppError::Catalog)?;
        let contacts = self.api.list_contacts().await.map_err(AppError::Catalog)?;

        tracing::info!(
            names = names.len(),
            contacts = contacts.len(),
            "Catalog loaded"
        );

        self.names = names;
        self.all_contacts = contacts;
        self.population = self.all_contacts.clone();
        self.selected_name = None;
        self.events.clear();
        self.selected_event = None;
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn all_contacts(&self) -> &[ContactRecord] {
        &self.all_contacts
    }

    /// The currently filtered population.
    pub fn population(&self) -> &[ContactRecord] {
        &self.population
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected_name.as_deref()
    }

    /// Events recorded under the selected name.
    pub fn events(&self) -> &[EventSummary] {
        &self.events
    }

    pub fn selected_event(&self) -> Option<&EventSummary> {
        self.selected_event.as_ref()
    }

    /// Set or clear the name filter. Clears the event filter and resets the
    /// population to all contacts.
    pub async fn select_name(&mut self, name: Option<&str>) -> Result<(), AppError> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        self.selected_name = name.map(str::to_string);
        self.selected_event = None;
        self.events.clear();
        self.population = self.all_contacts.clone();

        if let Some(name) = name {
            self.events = self
                .api
                .events_by_name(name)
                .await
                .map_err(AppError::Catalog)?;
            tracing::debug!(name, events = self.events.len(), "Events loaded for name");
        }
        Ok(())
    }

    /// Narrow the population to one of the selected name's events, or clear
    /// the event filter with `None`.
    pub async fn select_event(&mut self, batch_id: Option<&str>) -> Result<(), AppError> {
        let Some(batch_id) = batch_id.map(str::trim).filter(|b| !b.is_empty()) else {
            self.selected_event = None;
            self.population = self.all_contacts.clone();
            return Ok(());
        };

        if self.selected_name.is_none() {
            return Err(ValidationFailure::NameRequired.into());
        }
        let event = self
            .events
            .iter()
            .find(|e| e.batch_id == batch_id)
            .cloned()
            .ok_or_else(|| ValidationFailure::UnknownEvent(batch_id.to_string()))?;

        let contacts = self
            .api
            .contacts_by_batch(&event.batch_id)
            .await
            .map_err(AppError::Catalog)?;

        tracing::info!(
            batch_id = %event.batch_id,
            event = %event.event_name,
            contacts = contacts.len(),
            "Population narrowed to event"
        );

        self.population = contacts;
        self.selected_event = Some(event);
        Ok(())
    }

    /// Snapshots of every capture session.
    pub async fn batches(&self) -> Result<Vec<Batch>, AppError> {
        self.api.list_batches().await.map_err(AppError::Catalog)
    }

    /// Contacts of one batch, without touching the current filter.
    pub async fn batch_contacts(&self, batch_id: &str) -> Result<Vec<ContactRecord>, AppError> {
        self.api
            .contacts_by_batch(batch_id)
            .await
            .map_err(AppError::Catalog)
    }

    /// Search by operator name, then apply the team/event constraint locally
    /// on the structured record fields.
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<SearchRecord>, AppError> {
        let records = self
            .api
            .search_records(SearchKind::Name, filter.primary.trim())
            .await
            .map_err(AppError::Catalog)?;

        Ok(records
            .into_iter()
            .filter(|record| filter.matches_secondary(record))
            .collect())
    }
}
