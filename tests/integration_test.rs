use eclbin::kw::codec;
use eclbin::restart::{intehead_for, DOUBHEAD_KW, SEQNUM_KW};
use eclbin::{
    ActiveMap, EclError, Endian, FileIndex, GridDims, GridOverlay, Keyword, Mode, OpenOptions,
    RestartQuery, RestartResolver, Stream,
};
use chrono::NaiveDate;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_file(path: &Path, endian_flip: bool, keywords: &[Keyword]) {
    let mut stream = Stream::create(path, endian_flip).unwrap();
    stream.write_all(keywords).unwrap();
    stream.close().unwrap();
}

fn grid_file() -> Vec<Keyword> {
    vec![
        Keyword::new_float("PORO", vec![0.25; 6]).unwrap(),
        Keyword::new_float("SWAT", (0..6).map(|i| i as f32 / 10.0).collect()).unwrap(),
        Keyword::new_float("SGAS", vec![0.0; 6]).unwrap(),
        Keyword::new_double("PERMX", vec![100.0; 6]).unwrap(),
    ]
}

#[test]
fn test_index_completeness_and_order() {
    let tmp = NamedTempFile::new().unwrap();
    let keywords = grid_file();
    write_file(tmp.path(), true, &keywords);

    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let index = stream.build_index().unwrap();
    assert_eq!(index.len(), keywords.len());
    for (r, kw) in index.iter().zip(&keywords) {
        assert_eq!(r.header(), kw.header());
        assert_eq!(r.load().unwrap(), kw);
    }
}

#[test]
fn test_negative_positions() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), true, &grid_file());
    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let index = stream.build_index().unwrap();

    let last = index.by_position(-1).unwrap();
    assert_eq!(last.position(), index.by_position(3).unwrap().position());
    assert_eq!(last.name(), "PERMX");
    assert!(matches!(index.by_position(-5), Err(EclError::Index { .. })));
}

#[test]
fn test_sub_view_boundaries() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), false, &grid_file());
    let opts = OpenOptions::new().endian_flip(false);
    let stream = Stream::open(tmp.path(), &opts).unwrap();
    let index = stream.build_index().unwrap();

    let names = |v: eclbin::FileView<'_>| v.iter().map(|r| r.name().to_owned()).collect::<Vec<_>>();
    assert_eq!(names(index.sub_view("SWAT", Some("SGAS"), 0).unwrap()), ["SWAT"]);
    assert_eq!(names(index.sub_view("SWAT", None, 0).unwrap()), ["SWAT", "SGAS", "PERMX"]);
}

#[test]
fn test_lazy_index_after_close() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), true, &grid_file());

    let mut stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let lazy = stream.build_index().unwrap();
    let eager = FileIndex::build(&stream, false).unwrap();
    assert!(!lazy.is_loaded(0));
    let poro = lazy.by_position(0).unwrap().load().unwrap().clone();

    stream.close().unwrap();
    stream.close().unwrap();

    // cached payloads survive, uncached ones need the stream
    assert_eq!(lazy.by_position(0).unwrap().load().unwrap(), &poro);
    assert!(matches!(lazy.by_position(1).unwrap().load(), Err(EclError::StreamClosed)));
    assert_eq!(eager.named("PERMX", 0).unwrap().load().unwrap().len(), 6);
}

#[test]
fn test_lazy_load_after_drop() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), true, &grid_file());
    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let index = stream.build_index().unwrap();
    drop(stream);
    assert!(matches!(index.named("SWAT", 0).unwrap().load(), Err(EclError::StreamClosed)));
}

#[test]
fn test_indexed_read_from_disk() {
    let tmp = NamedTempFile::new().unwrap();
    let big = Keyword::new_int("BIG", (0..2500).collect()).unwrap();
    write_file(tmp.path(), true, &[big]);

    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let index = stream.build_index().unwrap();
    let picked = index.read_elements(0, &[0, 999, 1000, 2499]).unwrap();
    assert_eq!(picked.values::<i32>().unwrap(), &[0, 999, 1000, 2499]);
    assert!(!index.is_loaded(0));
    assert!(index.read_elements(0, &[2500]).unwrap_err().is_absent());
}

#[test]
fn test_append_mode_adds_entries() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), true, &grid_file()[..2]);

    let mut stream = Stream::open(tmp.path(), &OpenOptions::new().mode(Mode::Append)).unwrap();
    let mut index = stream.build_index().unwrap();
    assert_eq!(index.len(), 2);
    let before = index.entries().to_vec();

    stream.write_keyword(&Keyword::new_mess("ENDSOL").unwrap()).unwrap();
    assert_eq!(index.refresh(&stream).unwrap(), 1);
    assert_eq!(&index.entries()[..2], &before[..]);
    assert_eq!(index.by_position(-1).unwrap().name(), "ENDSOL");

    let reader = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let idx = reader.build_index().unwrap();
    assert_eq!(idx.keys(), ["PORO", "SWAT", "ENDSOL"]);
}

#[test]
fn test_failed_refresh_keeps_the_index_unchanged() {
    use std::io::Write;

    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), true, &[Keyword::new_int("A", vec![1]).unwrap()]);

    let mut stream = Stream::open(tmp.path(), &OpenOptions::new().mode(Mode::Append)).unwrap();
    let mut index = stream.build_index().unwrap();
    stream.write_keyword(&Keyword::new_int("B", vec![2]).unwrap()).unwrap();

    let c = codec::encode(&Keyword::new_int("C", vec![3, 4, 5]).unwrap(), Endian::Big).unwrap();
    let mut raw = std::fs::OpenOptions::new().append(true).open(tmp.path()).unwrap();
    raw.write_all(&c[..c.len() - 5]).unwrap();
    drop(raw);

    assert!(index.refresh(&stream).unwrap_err().is_format());
    assert_eq!(index.len(), 1);
    assert_eq!(index.keys(), ["A"]);
    assert!(!index.contains("B"));
    assert_eq!(index.count_of("B"), 0);
}

#[test]
fn test_corrupt_file_fails_whole_build() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), true, &grid_file());
    let len = std::fs::metadata(tmp.path()).unwrap().len();
    std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap().set_len(len - 5).unwrap();

    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    assert!(stream.build_index().unwrap_err().is_format());
    assert!(FileIndex::build(&stream, false).unwrap_err().is_format());
}

#[test]
fn test_wrong_byte_order_is_a_format_error() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), false, &grid_file());
    assert_eq!(Stream::probe(tmp.path()), Some(Endian::Little));
    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    assert!(stream.build_index().unwrap_err().is_format());
}

#[test]
fn test_restart_resolution_on_disk() {
    let tmp = NamedTempFile::new().unwrap();
    let mut keywords = Vec::new();
    for (step, day) in [(0, 1), (1, 2), (1, 2), (2, 3)] {
        let t = NaiveDate::from_ymd_opt(2024, 1, day).unwrap().and_hms_opt(0, 0, 0).unwrap();
        keywords.push(Keyword::new_int(SEQNUM_KW, vec![step]).unwrap());
        keywords.push(intehead_for(t).unwrap());
        keywords.push(Keyword::new_double(DOUBHEAD_KW, vec![(day - 1) as f64]).unwrap());
        keywords.push(Keyword::new_float("SWAT", vec![step as f32; 3]).unwrap());
    }
    write_file(tmp.path(), true, &keywords);

    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let index = stream.build_index().unwrap();
    let resolver = RestartResolver::new(index.global_view()).unwrap();
    let steps: Vec<i32> = resolver.points().iter().map(|p| p.report_step).collect();
    assert_eq!(steps, [0, 1, 1, 2]);

    let view = resolver.resolve(&RestartQuery::sim_days(2.0)).unwrap();
    let swat = view.named("SWAT", 0).unwrap().load().unwrap();
    assert_eq!(swat.values::<f32>().unwrap(), &[2.0f32; 3]);

    let t = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
    assert_eq!(resolver.resolve(&RestartQuery::sim_time(t)).unwrap().start(), 4);
    assert!(matches!(
        resolver.resolve(&RestartQuery::report_step(9)),
        Err(EclError::Lookup(_))
    ));
}

#[test]
fn test_grid_overlay_from_file() {
    let tmp = NamedTempFile::new().unwrap();
    let dims = GridDims::new(3, 2, 1);
    write_file(tmp.path(), true, &[
        Keyword::new_int("ACTNUM", vec![0, 1, 1, 1, 1, 1]).unwrap(),
        Keyword::new_int("SATNUM", vec![10, 20, 30, 40, 50]).unwrap(),
    ]);

    let stream = Stream::open(tmp.path(), &OpenOptions::default()).unwrap();
    let index = stream.build_index().unwrap();
    let grid = ActiveMap::from_actnum(dims, index.named("ACTNUM", 0).unwrap().load().unwrap()).unwrap();
    let satnum = index.named("SATNUM", 0).unwrap().load().unwrap().clone();

    let mut overlay = GridOverlay::bind(satnum, &grid, -1, true).unwrap();
    assert_eq!(overlay.get(0, 0, 0).unwrap(), -1);
    assert_eq!(overlay.get(2, 1, 0).unwrap(), 50);
    assert!(matches!(overlay.set(0, 0, 0, 1), Err(EclError::InactiveCell { .. })));
    overlay.set(1, 0, 0, 11).unwrap();
    assert_eq!(overlay.scatter().unwrap().values::<i32>().unwrap(), &[-1, 11, 20, 30, 40, 50]);
}

#[test]
fn test_read_only_stream_rejects_writes() {
    let tmp = NamedTempFile::new().unwrap();
    write_file(tmp.path(), true, &grid_file());
    let mut stream = eclbin::open(tmp.path(), Mode::Read, true).unwrap();
    assert!(matches!(
        stream.write_keyword(&Keyword::new_mess("X").unwrap()),
        Err(EclError::ReadOnly)
    ));
    assert_eq!(eclbin::build_index(&stream, true).unwrap().len(), 4);
}
