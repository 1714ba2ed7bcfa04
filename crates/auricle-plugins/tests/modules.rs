use std::sync::Arc;

use auricle_host::{LibraryResolver, ModuleLoader};
use auricle_sdk::{AcSpace, Registry, SignalFormat, SignalMut, Spectrum, Waveform};
use pretty_assertions::assert_eq;

fn resolver() -> LibraryResolver {
    let mut registry = Registry::new();
    auricle_plugins::register(&mut registry);
    LibraryResolver::new(Arc::new(registry)).with_search_path(Vec::new())
}

fn block(channels: usize, value: f32) -> Waveform {
    Waveform::from_interleaved(channels, vec![value; 4 * channels]).expect("block")
}

#[test]
fn every_bundled_module_is_registered() {
    let resolver = resolver();
    let mut names = resolver.registry().module_names();
    names.sort();
    assert_eq!(names, ["acframeno", "chain", "gain", "identity"]);
}

#[test]
fn identity_accepts_both_domains() {
    let resolver = resolver();
    let ac = AcSpace::new();
    let mut loader = ModuleLoader::load(&resolver, &ac, "identity").expect("load");
    assert!(!loader.has_parser());

    let format = SignalFormat::spectrum(1, 4, 16_000.0, 8, 8);
    assert_eq!(loader.prepare(format).expect("prepare"), format);
    let mut spec = Spectrum::new(5, 1);
    let out = loader.process(SignalMut::Spec(&mut spec)).expect("process");
    assert!(out.into_spec().is_some());
}

#[test]
fn gain_errors_name_the_instance() {
    let resolver = resolver();
    let ac = AcSpace::new();
    let mut loader = ModuleLoader::load(&resolver, &ac, "gain:left").expect("load");
    loader.parse("gains=[0 0 0]").expect("three gains");
    let err = loader
        .prepare(SignalFormat::waveform(2, 4, 16_000.0))
        .expect_err("two channels");
    assert_eq!(
        err.to_string(),
        "Error in module \"gain:left\":\nThe number of entries in the gain vector must be either 2 \
         (one per channel) or 1 (same gains for all channels)"
    );
}

#[test]
fn chain_forwards_parameters_and_processes_in_order() {
    let resolver = resolver();
    let ac = AcSpace::new();
    let mut loader = ModuleLoader::load(&resolver, &ac, "chain:outer").expect("load");
    loader
        .parse("algos=[acframeno:frames gain:boost]")
        .expect("algos");
    assert_eq!(
        loader.parse("algos?").expect("query"),
        "[acframeno:frames gain:boost]"
    );
    assert_eq!(loader.parse("?ls").expect("ls"), "[algos frames boost]");
    loader.parse("boost.max=20").expect("stage limit");
    loader.parse("boost.gains=20").expect("stage parameter");
    assert_eq!(loader.parse("boost.gains?").expect("stage query"), "[20]");

    let format = SignalFormat::waveform(2, 4, 16_000.0);
    loader.prepare(format).expect("prepare");
    for _ in 0..2 {
        let mut input = block(2, 0.1);
        let out = loader.process_wave(&mut input).expect("process");
        assert!((out.value(3, 1) - 1.0).abs() < 1e-4);
    }
    assert_eq!(ac.get_int("frames").expect("counter"), 2);

    let err = loader
        .parse("algos=[identity]")
        .expect_err("reload while prepared");
    assert!(err.to_string().contains("cannot be reloaded while prepared"));

    loader.release().expect("release");
    assert!(!ac.contains("frames"));
    loader.parse("algos=[identity]").expect("reload");
    assert_eq!(loader.parse("?ls").expect("ls"), "[algos identity]");
}

#[test]
fn chain_reports_stage_errors_with_both_names() {
    let resolver = resolver();
    let ac = AcSpace::new();
    let mut loader = ModuleLoader::load(&resolver, &ac, "chain").expect("load");
    loader.parse("algos=[gain:left]").expect("algos");
    let err = loader.parse("left.gains=40").expect_err("out of range");
    let message = err.to_string();
    assert!(message.starts_with(
        "Error in module \"chain:chain\":\nError in module \"gain:left\":"
    ));

    let err = loader.parse("algos=[missing]").expect_err("unknown library");
    assert!(err.to_string().contains("missing"));
    assert_eq!(loader.parse("algos?").expect("cleared"), "[]");
}

#[test]
fn empty_chain_passes_the_signal_through() {
    let resolver = resolver();
    let ac = AcSpace::new();
    let mut loader = ModuleLoader::load(&resolver, &ac, "chain").expect("load");
    let format = SignalFormat::waveform(1, 4, 16_000.0);
    assert_eq!(loader.prepare(format).expect("prepare"), format);
    let mut input = block(1, 0.25);
    assert_eq!(
        loader.process_wave(&mut input).expect("process").as_slice(),
        &[0.25; 4]
    );
}
