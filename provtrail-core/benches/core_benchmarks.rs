use chrono::{TimeZone, Utc};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use provtrail_core::{
    Coordinate, DefinitionRequest, EventRequest, Format, MemoryStore, PartyAttrs, Provenance,
    ScriptAttrs, SqliteStore,
};

fn chain<S: provtrail_core::EntityStore>(prov: &mut Provenance<S>, hops: usize, rows: usize) {
    prov.set_default_script(ScriptAttrs::new("sample_etl.py", "v1.9", "KG"));
    prov.set_default_steward(PartyAttrs::named("Hr. Koch"));
    let ts = Utc.with_ymd_and_hms(2022, 5, 12, 8, 0, 0).unwrap();
    for hop in 0..hops {
        let id = format!("hop{hop}");
        prov.add_definition(
            DefinitionRequest::new(&id, &id, format!("S{hop}"), format!("S{}", hop + 1))
                .source_variable("v")
                .destination_variable("v"),
        )
        .unwrap();
        for row in 0..rows {
            prov.make_provenance(
                &id,
                EventRequest::new(row.to_string(), row.to_string(), "ok", ts),
            )
            .unwrap();
        }
    }
}

fn bench_record(c: &mut Criterion) {
    c.bench_function("record_memory_4x100", |b| {
        b.iter_batched(
            Provenance::in_memory,
            |mut prov| chain(&mut prov, 4, 100),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("record_sqlite_4x100", |b| {
        b.iter_batched(
            || Provenance::new(SqliteStore::open_in_memory().unwrap()),
            |mut prov| chain(&mut prov, 4, 100),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("replay_sqlite_event", |b| {
        let mut prov = Provenance::new(SqliteStore::open_in_memory().unwrap());
        chain(&mut prov, 1, 1);
        let ts = Utc.with_ymd_and_hms(2022, 5, 12, 8, 0, 0).unwrap();
        b.iter(|| {
            prov.make_provenance(black_box("hop0"), EventRequest::new("0", "0", "ok", ts))
                .unwrap()
        })
    });
}

fn bench_resolve(c: &mut Criterion) {
    let mut memory = Provenance::new(MemoryStore::new());
    chain(&mut memory, 16, 50);
    let mut sqlite = Provenance::new(SqliteStore::open_in_memory().unwrap());
    chain(&mut sqlite, 16, 50);
    let target = Coordinate::new("S16", "v", "25");

    c.bench_function("trace_memory_16_hops", |b| {
        b.iter(|| memory.trace(black_box(&target)).unwrap())
    });

    c.bench_function("trace_sqlite_16_hops", |b| {
        b.iter(|| sqlite.trace(black_box(&target)).unwrap())
    });

    for format in Format::ALL {
        c.bench_function(&format!("render_sqlite_16_hops_{format}"), |b| {
            b.iter(|| sqlite.get_provenance("S16", "v", "25", black_box(format)).unwrap())
        });
    }
}

criterion_group!(benches, bench_record, bench_resolve);
criterion_main!(benches);
