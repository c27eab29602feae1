//! The provenance system: one entity store, the definition registry and the
//! defaults in force, behind the operations an ETL pipeline calls.

use tracing::{debug, info};

use crate::attributes::{Defaults, GovernanceAttrs, Merge, PartyAttrs, ScriptAttrs};
use crate::config::ProvtrailConfig;
use crate::definition::{DefinitionRequest, EventRequest};
use crate::error::{Result, StoreError};
use crate::lineage::{Lineage, LineageResolver};
use crate::model::{
    Coordinate, DataElement, DataProvenance, EntityId, EntityKind, NaturalKey, Stored,
};
use crate::registry::DefinitionRegistry;
use crate::render::{self, Format};
use crate::store::{EntityStore, MemoryStore, SqliteStore, StoreStats};

/// Provenance catalog over an entity store.
///
/// Holds its store for its whole lifetime. Call [`Provenance::close`] to
/// release it and observe errors; dropping releases it silently.
pub struct Provenance<S: EntityStore = Box<dyn EntityStore>> {
    store: S,
    registry: DefinitionRegistry,
    defaults: Defaults,
    max_depth: Option<usize>,
}

impl Provenance<Box<dyn EntityStore>> {
    /// Open the store described by `config` and apply its defaults and
    /// lineage limits.
    pub fn open(config: &ProvtrailConfig) -> Result<Self> {
        let store: Box<dyn EntityStore> = if config.database.in_memory {
            Box::new(SqliteStore::open_in_memory()?)
        } else {
            Box::new(SqliteStore::open(&config.database.path)?)
        };
        Ok(Self::with_defaults(store, config.defaults.clone())
            .with_max_depth(config.lineage.max_depth))
    }
}

impl Provenance<MemoryStore> {
    /// Catalog without any persistence, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: EntityStore> Provenance<S> {
    pub fn new(store: S) -> Self {
        Self::with_defaults(store, Defaults::default())
    }

    pub fn with_defaults(store: S, defaults: Defaults) -> Self {
        Self {
            store,
            registry: DefinitionRegistry::new(),
            defaults,
            max_depth: None,
        }
    }

    /// Bound every traced chain to `max_depth` steps.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Replace all four default groups at once.
    pub fn set_defaults(&mut self, defaults: Defaults) {
        self.defaults = defaults;
    }

    /// Replace the default script. Fields left unset mean "no default";
    /// nothing carries over from the previous value.
    pub fn set_default_script(&mut self, script: ScriptAttrs) {
        self.defaults.script = script;
    }

    pub fn set_default_owner(&mut self, owner: PartyAttrs) {
        self.defaults.owner = owner;
    }

    pub fn set_default_steward(&mut self, steward: PartyAttrs) {
        self.defaults.steward = steward;
    }

    pub fn set_default_governance(&mut self, governance: GovernanceAttrs) {
        self.defaults.governance = governance;
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Register a data element definition under `request.id`.
    ///
    /// Each reference group is resolved against the current defaults and
    /// persisted only if some field survives. The element itself is
    /// deduplicated on its full attribute tuple, so repeating a request
    /// rebinds the id to the same row.
    pub fn add_definition(&mut self, request: DefinitionRequest) -> Result<Stored<DataElement>> {
        request.validate()?;

        let owner = self.reference(
            request
                .owner
                .resolve(&self.defaults.owner)
                .map(|attrs| NaturalKey::party(EntityKind::DataOwner, &attrs)),
        )?;
        let steward = self.reference(
            request
                .steward
                .resolve(&self.defaults.steward)
                .map(|attrs| NaturalKey::party(EntityKind::DataSteward, &attrs)),
        )?;
        let governance = self.reference(
            request
                .governance
                .resolve(&self.defaults.governance)
                .map(|attrs| NaturalKey::governance(&attrs)),
        )?;
        let script = self.reference(
            request
                .script
                .resolve(&self.defaults.script)
                .map(|attrs| NaturalKey::script(&attrs)),
        )?;

        let (source, _) = self
            .store
            .get_or_create(&NaturalKey::data_store(&request.source))?;
        let (destination, _) = self
            .store
            .get_or_create(&NaturalKey::data_store(&request.destination))?;

        let element = DataElement {
            name: request.name,
            description: request.description,
            source,
            source_variable: request.source_variable,
            destination,
            destination_variable: request.destination_variable,
            description_of_transformation: request.description_of_transformation,
            description_of_qualitycheck: request.description_of_qualitycheck,
            status_log: request.status_log,
            script,
            owner,
            governance,
            steward,
        };
        let (id, created) = self.store.get_or_create(&element.natural_key())?;
        let stored = Stored {
            id,
            record: element,
            created,
        };

        if let Some(previous) = self.registry.bind(request.id.clone(), stored.clone()) {
            if previous.id != id {
                debug!(definition = %request.id, old = %previous.id, new = %id, "definition rebound");
            }
        }
        info!(definition = %request.id, element = %id, created, "definition registered");
        Ok(stored)
    }

    fn reference(&mut self, key: Option<NaturalKey>) -> Result<Option<EntityId>, StoreError> {
        key.map(|key| self.store.get_or_create(&key).map(|(id, _)| id))
            .transpose()
    }

    /// Record one movement of one value by the definition bound to `id`.
    /// Replaying an identical event returns the existing row.
    pub fn make_provenance(&mut self, id: &str, event: EventRequest) -> Result<Stored<DataProvenance>> {
        let element = self.registry.resolve(id)?.id;
        let record = DataProvenance {
            dataelement: element,
            source_reference: event.source_reference,
            destination_reference: event.destination_reference,
            quality: event.quality,
            timestamp: event.timestamp,
        };
        let (event_id, created) = self.store.get_or_create(&record.natural_key())?;
        debug!(definition = id, event = %event_id, created, "provenance recorded");
        Ok(Stored {
            id: event_id,
            record,
            created,
        })
    }

    /// Structured lineage of the value at `coord`.
    pub fn trace(&self, coord: &Coordinate) -> Result<Lineage> {
        LineageResolver::new(&self.store)
            .with_max_depth(self.max_depth)
            .resolve(coord)
    }

    /// Rendered lineage of `store.variable.reference`. Empty when nothing
    /// was recorded for it.
    pub fn get_provenance(
        &self,
        store: &str,
        variable: &str,
        reference: &str,
        format: Format,
    ) -> Result<String> {
        let lineage = self.trace(&Coordinate::new(store, variable, reference))?;
        render::render(&lineage, format)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.store.stats()?)
    }

    /// Release the store's resources, reporting any error on the way.
    pub fn close(self) -> Result<()> {
        info!(definitions = self.registry.len(), "closing provenance store");
        Box::new(self.store).release()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvenanceError;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn hop(id: &str, src: &str, dst: &str) -> DefinitionRequest {
        DefinitionRequest::new(id, id, src, dst)
            .source_variable("v")
            .destination_variable("v")
    }

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 5, 12, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_add_definition_is_idempotent() {
        let mut prov = Provenance::in_memory();
        prov.set_default_owner(PartyAttrs::named("A"));
        let first = prov.add_definition(hop("e1", "X", "Y")).unwrap();
        let second = prov.add_definition(hop("e1", "X", "Y")).unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(prov.stats().unwrap().get(EntityKind::DataElement), 1);
        assert_eq!(prov.stats().unwrap().get(EntityKind::DataOwner), 1);
        assert_eq!(prov.registry().resolve("e1").unwrap().id, first.id);
    }

    #[test]
    fn test_event_is_idempotent() {
        let mut prov = Provenance::in_memory();
        prov.add_definition(hop("e1", "X", "Y")).unwrap();
        let event = EventRequest::new("1", "2", "good", at(8));
        assert!(prov.make_provenance("e1", event.clone()).unwrap().created);
        assert!(!prov.make_provenance("e1", event).unwrap().created);
        assert_eq!(prov.stats().unwrap().get(EntityKind::DataProvenance), 1);
    }

    #[test]
    fn test_unknown_definition() {
        let mut prov = Provenance::in_memory();
        let err = prov
            .make_provenance("nope", EventRequest::new("1", "2", "good", at(8)))
            .unwrap_err();
        assert!(matches!(err, ProvenanceError::UnknownDefinition { .. }));
    }

    #[test]
    fn test_missing_destination_rejected() {
        let mut prov = Provenance::in_memory();
        let err = prov
            .add_definition(DefinitionRequest::new("e1", "e1", "X", ""))
            .unwrap_err();
        assert!(matches!(err, ProvenanceError::MissingField { field: "destination" }));
        assert_eq!(prov.stats().unwrap().total(), 0);
    }

    #[test]
    fn test_override_resolution() {
        let mut prov = Provenance::in_memory();
        prov.set_default_owner(PartyAttrs::named("A"));
        prov.add_definition(hop("defaulted", "X", "Y")).unwrap();
        prov.add_definition(hop("explicit", "X", "Z").owner(PartyAttrs::named("B")))
            .unwrap();
        prov.make_provenance("defaulted", EventRequest::new("1", "2", "ok", at(8)))
            .unwrap();
        prov.make_provenance("explicit", EventRequest::new("1", "3", "ok", at(8)))
            .unwrap();

        let owner_of = |store: &str, reference: &str| {
            let lineage = prov.trace(&Coordinate::new(store, "v", reference)).unwrap();
            let step = lineage.steps().next().unwrap().clone();
            step.event.owner.and_then(|o| o.name)
        };
        assert_eq!(owner_of("Y", "2").as_deref(), Some("A"));
        assert_eq!(owner_of("Z", "3").as_deref(), Some("B"));
    }

    #[test]
    fn test_later_defaults_leave_existing_elements_alone() {
        let mut prov = Provenance::in_memory();
        prov.set_default_owner(PartyAttrs::named("A"));
        prov.add_definition(hop("e1", "X", "Y")).unwrap();
        prov.set_default_owner(PartyAttrs::named("B"));
        prov.make_provenance("e1", EventRequest::new("1", "2", "ok", at(8)))
            .unwrap();

        let lineage = prov.trace(&Coordinate::new("Y", "v", "2")).unwrap();
        let owner = lineage.steps().next().unwrap().event.owner.clone();
        assert_eq!(owner.and_then(|o| o.name).as_deref(), Some("A"));
        assert_eq!(prov.stats().unwrap().get(EntityKind::DataOwner), 1);

        // Only definitions registered afterwards pick up the new owner.
        prov.add_definition(hop("e2", "X", "Z")).unwrap();
        prov.make_provenance("e2", EventRequest::new("1", "3", "ok", at(9)))
            .unwrap();
        let lineage = prov.trace(&Coordinate::new("Z", "v", "3")).unwrap();
        let owner = lineage.steps().next().unwrap().event.owner.clone();
        assert_eq!(owner.and_then(|o| o.name).as_deref(), Some("B"));
    }

    #[test]
    fn test_with_defaults_builder() {
        let defaults = Defaults::default()
            .with_script(ScriptAttrs::new("etl.py", "v1", "KG"))
            .with_owner(PartyAttrs::named("A"))
            .with_steward(PartyAttrs::named("S"))
            .with_governance(GovernanceAttrs::new("SOP z", "v5", "approved"));
        let mut prov = Provenance::with_defaults(MemoryStore::new(), defaults.clone());
        assert_eq!(prov.defaults(), &defaults);

        let stored = prov.add_definition(hop("e1", "X", "Y")).unwrap();
        assert!(stored.record.script.is_some());
        assert!(stored.record.owner.is_some());
        assert!(stored.record.steward.is_some());
        assert!(stored.record.governance.is_some());
    }

    #[test]
    fn test_default_replace_is_full() {
        let mut prov = Provenance::in_memory();
        prov.set_default_script(ScriptAttrs::new("etl.py", "v1", "KG"));
        prov.set_default_script(ScriptAttrs {
            name: Some("load.py".into()),
            ..Default::default()
        });
        assert!(prov.defaults().script.version.is_none());
        assert!(prov.defaults().script.creator.is_none());
    }

    #[test]
    fn test_empty_groups_leave_reference_unset() {
        let mut prov = Provenance::in_memory();
        let stored = prov.add_definition(hop("e1", "X", "Y")).unwrap();
        assert!(stored.record.script.is_none());
        assert!(stored.record.owner.is_none());
        assert!(stored.record.steward.is_none());
        assert!(stored.record.governance.is_none());
        assert_eq!(prov.stats().unwrap().get(EntityKind::Script), 0);
    }

    #[test]
    fn test_chain_most_recent_first() {
        let mut prov = Provenance::in_memory();
        prov.set_default_script(ScriptAttrs::new("etl.py", "v1", "KG"));
        prov.set_default_steward(PartyAttrs::new("Hr. Koch", "Data Steward", "", ""));
        prov.add_definition(hop("e1", "X", "Y")).unwrap();
        prov.add_definition(hop("e2", "Y", "Z")).unwrap();
        prov.make_provenance("e1", EventRequest::new("1", "2", "ok", at(8)))
            .unwrap();
        prov.make_provenance("e2", EventRequest::new("2", "3", "ok", at(9)))
            .unwrap();

        let text = prov.get_provenance("Z", "v", "3", Format::LogText).unwrap();
        assert_eq!(
            text,
            "Y.v.2 was converted by etl.py v1 to Z.v.3 by Hr. Koch Data Steward\n\
             X.v.1 was converted by etl.py v1 to Y.v.2 by Hr. Koch Data Steward\n"
        );
    }

    #[test]
    fn test_no_match_is_empty() {
        let prov = Provenance::in_memory();
        for format in Format::ALL {
            assert_eq!(prov.get_provenance("Z", "v", "3", format).unwrap(), "");
        }
    }

    #[test]
    fn test_multiplicity() {
        let mut prov = Provenance::in_memory();
        prov.add_definition(hop("a", "X", "Z")).unwrap();
        prov.add_definition(hop("b", "W", "Z")).unwrap();
        prov.make_provenance("a", EventRequest::new("1", "3", "ok", at(8)))
            .unwrap();
        prov.make_provenance("b", EventRequest::new("7", "3", "ok", at(9)))
            .unwrap();
        let lineage = prov.trace(&Coordinate::new("Z", "v", "3")).unwrap();
        let names: Vec<_> = lineage.steps().map(|s| s.event.element_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_max_depth_truncates() {
        let mut prov = Provenance::in_memory().with_max_depth(Some(1));
        prov.add_definition(hop("e1", "X", "Y")).unwrap();
        prov.add_definition(hop("e2", "Y", "Z")).unwrap();
        prov.make_provenance("e1", EventRequest::new("1", "2", "ok", at(8)))
            .unwrap();
        prov.make_provenance("e2", EventRequest::new("2", "3", "ok", at(9)))
            .unwrap();
        let lineage = prov.trace(&Coordinate::new("Z", "v", "3")).unwrap();
        assert_eq!(lineage.steps().count(), 1);
        assert!(lineage.is_truncated());
    }

    #[test]
    fn test_open_in_memory_config() {
        let mut config = ProvtrailConfig::default();
        config.database.in_memory = true;
        config.defaults.owner = PartyAttrs::named("A");
        let mut prov = Provenance::open(&config).unwrap();
        let stored = prov.add_definition(hop("e1", "X", "Y")).unwrap();
        assert!(stored.record.owner.is_some());
        prov.close().unwrap();
    }
}
