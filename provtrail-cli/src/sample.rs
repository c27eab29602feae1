//! Vital-signs sample pipeline used by `demo` and `bench`.
//!
//! Seven data elements move from the SAP staging area into the warehouse;
//! the average pulse is then derived from the warehouse pulse, giving a
//! two-hop chain to trace.

use chrono::Utc;
use provtrail_core::{
    Coordinate, Defaults, DefinitionRequest, EntityStore, EventRequest, GovernanceAttrs,
    PartyAttrs, Provenance, ScriptAttrs,
};

/// Data elements recorded for every row.
pub const ELEMENTS_PER_ROW: usize = 7;

const WAREHOUSE_OFFSET: usize = 10_000;
const AVERAGES_OFFSET: usize = 20_000;

/// Install the default groups and register all sample definitions.
pub fn register<S: EntityStore>(prov: &mut Provenance<S>) -> provtrail_core::Result<()> {
    prov.set_defaults(
        Defaults::default()
            .with_script(ScriptAttrs::new("sample_etl.py", "v1.9", "KG"))
            .with_owner(PartyAttrs::new(
                "Prof. Meier",
                "Data Owner",
                "Director",
                "Chirurgie",
            ))
            .with_governance(GovernanceAttrs::new("SOP z", "v5", "approved"))
            .with_steward(PartyAttrs::new(
                "Hr. Koch",
                "Data Steward",
                "Programmer",
                "DIC - DBMI",
            )),
    );
    let sop_xy = GovernanceAttrs::new("SOP xy", "v1", "approved");

    let definitions = [
        vital("patid", "Patient Number unique", "patid", "PID", "copy", "range check 1-10000000")
            .owner(PartyAttrs::new("", "", "", ""))
            .steward(PartyAttrs::new("", "", "", ""))
            .governance(sop_xy.clone()),
        vital("pulse", "Puls rate", "pulse", "Pulse", "copy", "range check 40-150"),
        DefinitionRequest::new("averagepulse", "averagepulse", "dwh_vitalis", "dwh_averages")
            .description("average Puls rate")
            .source_variable("Pulse")
            .destination_variable("avg_pulse")
            .transformation("averaging")
            .quality_check("range check 40-150")
            .status_log("passed  date 12.May2022")
            .script(ScriptAttrs::new("sample_etl2.py", "v1.9", "KG")),
        vital(
            "syst_blood_pressure",
            "Systolic Blood Pressure",
            "SysBP",
            "SBP",
            "copy",
            "range check 80-160",
        )
        .governance(GovernanceAttrs::new("SOP p", "v1.5", "approved"))
        .steward(PartyAttrs::named("no name given")),
        vital(
            "diast_blood_pressure",
            "Diastolic Blood Pressure",
            "DiaBP",
            "DBP",
            "copy",
            "range check 50-120",
        )
        .owner(PartyAttrs {
            name: Some("Prof. Becker".into()),
            role: Some("Data Owner".into()),
            kind: None,
            department: Some("Intensiv".into()),
        })
        .governance(sop_xy.clone()),
        vital(
            "performer",
            "Performer",
            "Staff member",
            "Performed by",
            "copy upper letters",
            "name in ABCDE",
        )
        .owner(PartyAttrs::new("Schwester Anne", "Data Owner", "nurse", "Chirurgie"))
        .governance(sop_xy.clone()),
        vital(
            "date",
            "Date of examination",
            "dat_exam",
            "Date YYYY-MM-DD",
            "convert date",
            "range check > 01.01.2022",
        )
        .governance(sop_xy),
    ];

    for definition in definitions {
        prov.add_definition(definition)?;
    }
    Ok(())
}

fn vital(
    id: &str,
    description: &str,
    source_variable: &str,
    destination_variable: &str,
    transformation: &str,
    quality_check: &str,
) -> DefinitionRequest {
    DefinitionRequest::new(id, id, "stg_sap_vitalis", "dwh_vitalis")
        .description(description)
        .source_variable(source_variable)
        .destination_variable(destination_variable)
        .transformation(transformation)
        .quality_check(quality_check)
        .status_log("passed  date 12.May2022")
}

/// Record the events for rows `1..=rows`.
pub fn record_rows<S: EntityStore>(prov: &mut Provenance<S>, rows: usize) -> provtrail_core::Result<()> {
    for row in 1..=rows {
        let staged = row.to_string();
        let warehouse = (row + WAREHOUSE_OFFSET).to_string();
        prov.make_provenance("patid", EventRequest::now(&staged, &warehouse, "super"))?;
        for id in [
            "pulse",
            "syst_blood_pressure",
            "diast_blood_pressure",
            "performer",
            "date",
        ] {
            prov.make_provenance(id, EventRequest::now(&staged, &warehouse, "low"))?;
        }
        prov.make_provenance(
            "averagepulse",
            EventRequest::new(
                &warehouse,
                (row + AVERAGES_OFFSET).to_string(),
                "low",
                Utc::now(),
            ),
        )?;
    }
    Ok(())
}

/// The averaged pulse of one row, the end of the longest sample chain.
pub fn average_pulse(row: usize) -> Coordinate {
    Coordinate::new("dwh_averages", "avg_pulse", (row + AVERAGES_OFFSET).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use provtrail_core::{EntityKind, Format};

    #[test]
    fn test_sample_pipeline_counts() {
        let mut prov = Provenance::in_memory();
        register(&mut prov).unwrap();
        record_rows(&mut prov, 3).unwrap();
        let stats = prov.stats().unwrap();
        assert_eq!(stats.get(EntityKind::DataElement), ELEMENTS_PER_ROW);
        assert_eq!(stats.get(EntityKind::DataProvenance), 3 * ELEMENTS_PER_ROW);
        assert_eq!(stats.get(EntityKind::DataStore), 3);
        assert_eq!(stats.get(EntityKind::Script), 2);
        // Prof. Meier, Prof. Becker, Schwester Anne
        assert_eq!(stats.get(EntityKind::DataOwner), 3);
    }

    #[test]
    fn test_average_pulse_chain() {
        let mut prov = Provenance::in_memory();
        register(&mut prov).unwrap();
        record_rows(&mut prov, 2).unwrap();
        let coord = average_pulse(2);
        let text = prov
            .get_provenance(&coord.store, &coord.variable, &coord.reference, Format::LogText)
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "dwh_vitalis.Pulse.10002 was converted by sample_etl2.py v1.9 to \
                 dwh_averages.avg_pulse.20002 by Hr. Koch Data Steward",
                "stg_sap_vitalis.pulse.2 was converted by sample_etl.py v1.9 to \
                 dwh_vitalis.Pulse.10002 by Hr. Koch Data Steward",
            ]
        );
    }

    #[test]
    fn test_empty_overrides_use_defaults() {
        let mut prov = Provenance::in_memory();
        register(&mut prov).unwrap();
        record_rows(&mut prov, 1).unwrap();
        let lineage = prov
            .trace(&Coordinate::new("dwh_vitalis", "PID", "10001"))
            .unwrap();
        let event = &lineage.steps().next().unwrap().event;
        let owner = event.owner.as_ref().unwrap();
        assert_eq!(owner.name.as_deref(), Some("Prof. Meier"));
        let sop = event.governance.as_ref().unwrap();
        assert_eq!(sop.name.as_deref(), Some("SOP xy"));
    }
}
