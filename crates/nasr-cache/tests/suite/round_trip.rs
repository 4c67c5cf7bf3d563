use nasr_cache::{CacheCodec, CacheEntry, CacheStore, Result};
use pretty_assertions::assert_eq;
use std::num::NonZeroUsize;

#[derive(Clone, Debug, PartialEq)]
struct Scalars {
    flag: bool,
    letter: char,
    tiny: i8,
    short: i16,
    int: i32,
    long: i64,
    byte: u8,
    ushort: u16,
    uint: u32,
    ulong: u64,
    single: f32,
    double: f64,
    text: String,
    empty: String,
    missing: Option<String>,
    present: Option<String>,
}

struct ScalarsCodec;

impl CacheCodec<String, Scalars> for ScalarsCodec {
    fn decode(&self, entry: &CacheEntry) -> Result<Scalars> {
        Ok(Scalars {
            flag: entry.get_bool("flag")?,
            letter: entry.get_char("letter")?,
            tiny: entry.get_i8("tiny")?,
            short: entry.get_i16("short")?,
            int: entry.get_i32("int")?,
            long: entry.get_i64("long")?,
            byte: entry.get_u8("byte")?,
            ushort: entry.get_u16("ushort")?,
            uint: entry.get_u32("uint")?,
            ulong: entry.get_u64("ulong")?,
            single: entry.get_f32("single")?,
            double: entry.get_f64("double")?,
            text: entry.get_required("text")?.to_string(),
            empty: entry.get_required("empty")?.to_string(),
            missing: entry.get_optional("missing", "string")?,
            present: entry.get_optional("present", "string")?,
        })
    }

    fn encode(&self, value: &Scalars, entry: &mut CacheEntry) {
        entry.put("flag", value.flag);
        entry.put("letter", value.letter);
        entry.put("tiny", value.tiny);
        entry.put("short", value.short);
        entry.put("int", value.int);
        entry.put("long", value.long);
        entry.put("byte", value.byte);
        entry.put("ushort", value.ushort);
        entry.put("uint", value.uint);
        entry.put("ulong", value.ulong);
        entry.put("single", value.single);
        entry.put("double", value.double);
        entry.put("text", &value.text);
        entry.put("empty", &value.empty);
        entry.put("missing", value.missing.as_deref());
        entry.put("present", value.present.as_deref());
    }

    fn encode_key(&self, key: &String) -> String {
        key.clone()
    }

    fn decode_key(&self, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }

    fn summarize(&self, _value: &Scalars) -> Option<String> {
        None
    }

    fn restore_summary(&mut self, _key: &String, _summary: Option<&str>) -> Result<()> {
        Ok(())
    }
}

fn extremes() -> Scalars {
    Scalars {
        flag: true,
        letter: 'ß',
        tiny: i8::MIN,
        short: i16::MAX,
        int: -2_000_000_000,
        long: i64::MIN,
        byte: u8::MAX,
        ushort: 0,
        uint: u32::MAX,
        ulong: u64::MAX,
        single: 0.1,
        double: -1.0e-300,
        text: "  leading spaces, = signs: and # marks\\ \n\t".to_string(),
        empty: String::new(),
        missing: None,
        present: Some("null".to_string()),
    }
}

#[test]
fn every_scalar_kind_survives_eviction() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = CacheStore::new(ScalarsCodec)
        .with_directory(tmp.path())
        .with_capacity(NonZeroUsize::new(1).unwrap());
    store.initialize(false).unwrap();

    let key = "key with spaces/and slashes".to_string();
    store.add(key.clone(), extremes()).unwrap();
    store.force_unload(&key).unwrap();
    assert!(!store.contains(&key));

    assert_eq!(*store.get(&key).unwrap(), extremes());
}

#[test]
fn persisted_entries_use_the_property_format() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = CacheStore::new(ScalarsCodec).with_directory(tmp.path());
    store.initialize(false).unwrap();
    store.add("k".to_string(), extremes()).unwrap();
    store.empty_all().unwrap();

    let text = std::fs::read_to_string(tmp.path().join("k.cache")).unwrap();
    let properties = nasr_properties::parse(&text);
    assert_eq!(properties.get("missing"), Some("null"));
    assert_eq!(properties.get("present"), Some("'null"));
    assert_eq!(properties.get("empty"), Some(""));
    assert_eq!(properties.get("ulong"), Some("18446744073709551615"));
}
