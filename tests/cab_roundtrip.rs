use cab_store::{CabAppender, CabReader, CabWriter, Config, DataType, PathInfo, SchemaPath, SchemaTree, Value};
use test_log::test;

fn schema_with(path: &str, info: PathInfo) -> SchemaTree {
    let mut tree = SchemaTree::new();
    tree.register(SchemaPath::from(path), info);
    tree
}

#[test]
fn aligned_writer_round_trips_fixed_size_ints() -> cab_store::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("col");
    let schema = schema_with(
        "count",
        PathInfo {
            data_type: DataType::Int32,
            max_rep: 0,
            max_def: 1,
        },
    );
    let config = Config::with_capacity(8);

    {
        let mut writer =
            CabWriter::init2write(&base, &SchemaPath::from("count"), &schema, config.clone(), 0)?;
        for v in 0..50 {
            writer.write_value(0, &Value::Int32(v))?;
        }
    }

    let mut reader = CabReader::init2read(&base, &SchemaPath::from("count"), &schema, config)?;
    assert_eq!(50, reader.record_count());

    for record_id in 0..50u64 {
        let items = reader.read_record(record_id)?;
        assert_eq!(1, items.len());
        assert_eq!(
            Value::Int32(record_id as i32),
            DataType::Int32.decode_value(items[0].value.as_ref().expect("non-null"))
        );
    }

    Ok(())
}

#[test]
fn single_repetition_nested_records_preserve_boundaries() -> cab_store::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("col");
    let schema = schema_with(
        "tags",
        PathInfo {
            data_type: DataType::Text,
            max_rep: 1,
            max_def: 2,
        },
    );
    let config = Config::with_capacity(8);

    {
        let mut writer =
            CabWriter::init2write(&base, &SchemaPath::from("tags"), &schema, config.clone(), 0)?;
        // record 0: ["x", "y"], record 1: [] (null), record 2: ["z"]
        writer.write_text(0, "x")?;
        writer.write_text(1, "y")?;
        writer.write_null(0, 0)?;
        writer.write_text(0, "z")?;
    }

    let mut reader = CabReader::init2read(&base, &SchemaPath::from("tags"), &schema, config)?;

    let record0 = reader.read_record(0)?;
    assert_eq!(2, record0.len());
    assert_eq!("x", String::from_utf8_lossy(record0[0].value.as_ref().unwrap()));
    assert_eq!("y", String::from_utf8_lossy(record0[1].value.as_ref().unwrap()));

    let record1 = reader.read_record(1)?;
    assert_eq!(1, record1.len());
    assert!(record1[0].is_null(2));

    let record2 = reader.read_record(2)?;
    assert_eq!(1, record2.len());
    assert_eq!("z", String::from_utf8_lossy(record2[0].value.as_ref().unwrap()));

    Ok(())
}

#[test]
fn appender_merges_new_records_into_unaligned_tail() -> cab_store::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("col");
    let schema = schema_with(
        "v",
        PathInfo {
            data_type: DataType::Int64,
            max_rep: 0,
            max_def: 1,
        },
    );
    let config = Config::with_capacity(5);

    {
        let mut writer =
            CabWriter::init2write(&base, &SchemaPath::from("v"), &schema, config.clone(), 0)?;
        for v in 0..7 {
            writer.write_value(0, &Value::Int64(v))?;
        }
        // 7 records at capacity 5: one full block, one partial (2 records).
    }

    {
        let mut appender =
            CabAppender::init2append(&base, &SchemaPath::from("v"), &schema, config.clone())?;
        for v in 7..13 {
            appender.write_value(0, &Value::Int64(v))?;
        }
    }

    let mut reader = CabReader::init2read(&base, &SchemaPath::from("v"), &schema, config)?;
    assert_eq!(13, reader.record_count());

    for record_id in 0..13u64 {
        let items = reader.read_record(record_id)?;
        assert_eq!(
            Value::Int64(record_id as i64),
            DataType::Int64.decode_value(items[0].value.as_ref().expect("non-null"))
        );
    }

    Ok(())
}

#[test]
fn all_null_block_round_trips_without_value_bytes() -> cab_store::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("col");
    let schema = schema_with(
        "maybe",
        PathInfo {
            data_type: DataType::Bytes,
            max_rep: 0,
            max_def: 1,
        },
    );
    let config = Config::with_capacity(4);

    {
        let mut writer =
            CabWriter::init2write(&base, &SchemaPath::from("maybe"), &schema, config.clone(), 0)?;
        for _ in 0..4 {
            writer.write_null(0, 0)?;
        }
    }

    let mut reader = CabReader::init2read(&base, &SchemaPath::from("maybe"), &schema, config)?;
    assert_eq!(1, reader.block_count());

    for record_id in 0..4 {
        let items = reader.read_record(record_id)?;
        assert_eq!(1, items.len());
        assert!(items[0].is_null(1));
        assert!(items[0].value.is_none());
    }

    Ok(())
}

#[test]
fn predicate_pushdown_narrows_candidate_blocks() -> cab_store::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("col");
    let schema = schema_with(
        "score",
        PathInfo {
            data_type: DataType::Int32,
            max_rep: 0,
            max_def: 1,
        },
    );
    let config = Config::with_capacity(5);

    {
        let mut writer =
            CabWriter::init2write(&base, &SchemaPath::from("score"), &schema, config.clone(), 0)?;
        for v in 0..25 {
            writer.write_value(0, &Value::Int32(v))?;
        }
    }

    let reader = CabReader::init2read(&base, &SchemaPath::from("score"), &schema, config)?;
    assert_eq!(5, reader.block_count());

    let needle = DataType::Int32.encode_value(&Value::Int32(22));
    let candidates = reader.candidate_blocks(&needle);
    assert_eq!(vec![4], candidates);

    let needle_low = DataType::Int32.encode_value(&Value::Int32(3));
    let candidates_low = reader.candidate_blocks(&needle_low);
    assert_eq!(vec![0], candidates_low);

    Ok(())
}

#[test]
fn reopening_after_a_crash_truncates_stray_content_bytes() -> cab_store::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("col");
    let schema = schema_with(
        "v",
        PathInfo {
            data_type: DataType::Int32,
            max_rep: 0,
            max_def: 1,
        },
    );
    let config = Config::with_capacity(4);

    {
        let mut writer =
            CabWriter::init2write(&base, &SchemaPath::from("v"), &schema, config.clone(), 0)?;
        for v in 0..4 {
            writer.write_value(0, &Value::Int32(v))?;
        }
    }

    // Simulate a crash between a content flush and its descriptor append:
    // append stray bytes past the last known-good block's extent.
    let content_path = base.with_extension("cab");
    {
        use std::io::Write as _;
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&content_path)?;
        f.write_all(b"garbage from an interrupted flush")?;
    }

    {
        let mut appender =
            CabAppender::init2append(&base, &SchemaPath::from("v"), &schema, config.clone())?;
        for v in 4..8 {
            appender.write_value(0, &Value::Int32(v))?;
        }
    }

    let mut reader = CabReader::init2read(&base, &SchemaPath::from("v"), &schema, config)?;
    assert_eq!(8, reader.record_count());

    for record_id in 0..8u64 {
        let items = reader.read_record(record_id)?;
        assert_eq!(
            Value::Int32(record_id as i32),
            DataType::Int32.decode_value(items[0].value.as_ref().expect("non-null"))
        );
    }

    Ok(())
}
