use cid::multihash::Multihash;
use cid::Cid;
use ipld_core::ipld::Ipld;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use uncar::codec::{encode_dag_cbor, to_json, DAG_CBOR};
use uncar::extract::{extract, ExtractError, COMMIT_FILE};
use uncar::list::{list, ListError, Listing};
use uncar::{Archive, ArchiveError, Block, CarWriter};

fn cid(seed: u8) -> Cid {
    Cid::new_v1(DAG_CBOR, Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap())
}

fn map(entries: Vec<(&str, Ipld)>) -> Ipld {
    Ipld::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<BTreeMap<_, _>>())
}

fn s(v: &str) -> Ipld { Ipld::String(v.to_string()) }

fn cbor_block(seed: u8, value: &Ipld) -> Block {
    Block::new(cid(seed), encode_dag_cbor(value).unwrap())
}

fn write_car(dir: &Path, name: &str, blocks: &[Block]) -> std::path::PathBuf {
    let path = dir.join(name);
    let roots = blocks.first().map(|b| vec![b.cid]).unwrap_or_default();
    let mut writer = CarWriter::new(fs::File::create(&path).unwrap(), roots).unwrap();
    for b in blocks {
        writer.write_block(b).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_commit_and_record_extracted() {
    let tmp = TempDir::new().unwrap();
    let commit = map(vec![
        ("version", Ipld::Integer(2)),
        ("did", s("did:plc:abc")),
        ("rev", s("1")),
    ]);
    let post = map(vec![
        ("$type", s("app.bsky.feed.post")),
        ("rkey", s("3k2x")),
        ("text", s("hi")),
    ]);
    let car = write_car(tmp.path(), "repo.car", &[cbor_block(1, &commit), cbor_block(2, &post)]);
    let out = tmp.path().join("out");

    let report = extract(&car, Some(&out)).unwrap();
    assert_eq!(report.records_written, 1);
    assert_eq!(report.commit, Some(cid(1)));

    let commit_json = read_json(&out.join(COMMIT_FILE));
    assert_eq!(commit_json["did"], "did:plc:abc");
    assert_eq!(commit_json["version"], 2);
    assert_eq!(commit_json["rev"], "1");

    let post_json = read_json(&out.join("app.bsky.feed.post/3k2x.json"));
    assert_eq!(post_json, to_json(&post));
}

#[test]
fn test_profile_written_as_self() {
    let tmp = TempDir::new().unwrap();
    let profile = map(vec![("$type", s("app.bsky.actor.profile")), ("displayName", s("Ann"))]);
    let car = write_car(tmp.path(), "repo.car", &[cbor_block(9, &profile)]);
    let out = tmp.path().join("out");

    let report = extract(&car, Some(&out)).unwrap();
    assert_eq!(report.records_written, 1);
    assert!(out.join("app.bsky.actor.profile/self.json").is_file());
}

#[test]
fn test_fallback_key_from_cid_suffix() {
    let tmp = TempDir::new().unwrap();
    let like = map(vec![("$type", s("app.bsky.feed.like"))]);
    let car = write_car(tmp.path(), "repo.car", &[cbor_block(4, &like)]);
    let out = tmp.path().join("out");

    extract(&car, Some(&out)).unwrap();
    let cid_str = cid(4).to_string();
    let key = &cid_str[cid_str.len() - 12..];
    assert!(out.join(format!("app.bsky.feed.like/{key}.json")).is_file());
}

#[test]
fn test_undecodable_block_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let post = map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("a"))]);
    let blocks = vec![
        Block::new(cid(1), vec![0xff, 0xfe, 0xfd]),
        cbor_block(2, &post),
    ];
    let car = write_car(tmp.path(), "repo.car", &blocks);
    let out = tmp.path().join("out");

    let report = extract(&car, Some(&out)).unwrap();
    assert_eq!(report.decode_failures, 1);
    assert_eq!(report.records_written, 1);
    assert!(report.commit.is_none());
}

#[test]
fn test_large_undecodable_block_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let post = map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("after"))]);
    let blocks = vec![
        Block::new(cid(1), vec![0xff; 3 * 1024 * 1024]),
        cbor_block(2, &post),
    ];
    let car = write_car(tmp.path(), "repo.car", &blocks);
    let out = tmp.path().join("out");

    let report = extract(&car, Some(&out)).unwrap();
    assert_eq!(report.blocks_seen, 2);
    assert_eq!(report.decode_failures, 1);
    assert_eq!(report.records_written, 1);
    assert!(out.join("app.bsky.feed.post/after.json").is_file());
}

#[test]
fn test_index_nodes_only() {
    let tmp = TempDir::new().unwrap();
    let node = |seed: u8| {
        cbor_block(seed, &map(vec![
            ("l", Ipld::Link(cid(seed + 100))),
            ("e", Ipld::List(vec![map(vec![("k", Ipld::Bytes(b"app.x/1".to_vec()))])])),
        ]))
    };
    let car = write_car(tmp.path(), "repo.car", &[node(1), node(2)]);
    let out = tmp.path().join("out");

    let report = extract(&car, Some(&out)).unwrap();
    assert_eq!(report.records_written, 0);
    assert_eq!(report.index_nodes, 2);
    assert!(report.commit.is_none());
    assert!(!out.join(COMMIT_FILE).exists());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_list_records_in_archive_order() {
    let tmp = TempDir::new().unwrap();
    let first = map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("zzz"))]);
    let second = map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("aaa"))]);
    let commit = map(vec![("rev", s("1"))]);
    let car = write_car(
        tmp.path(),
        "repo.car",
        &[cbor_block(1, &commit), cbor_block(2, &first), cbor_block(3, &second)],
    );

    let mut out = Vec::new();
    let n = list(&car, &mut out).unwrap();
    assert_eq!(n, 2);
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Collection/RecordKey\t\tCID");
    assert_eq!(lines[1], format!("app.bsky.feed.post/zzz\t{}", cid(2)));
    assert_eq!(lines[2], format!("app.bsky.feed.post/aaa\t{}", cid(3)));
    assert_eq!(lines.len(), 3);

    // Listing writes nothing to disk.
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[test]
fn test_listing_is_lazy_over_archive_blocks() {
    let tmp = TempDir::new().unwrap();
    let post = map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("a"))]);
    let car = write_car(tmp.path(), "repo.car", &[cbor_block(1, &post), cbor_block(2, &post)]);

    let archive = Archive::open(&car).unwrap();
    assert_eq!(archive.roots(), &[cid(1)]);
    let mut listing = Listing::new(archive.blocks());
    assert_eq!(listing.next().unwrap().unwrap().cid, cid(1));
    assert_eq!(listing.next().unwrap().unwrap().cid, cid(2));
    assert!(listing.next().is_none());
}

#[test]
fn test_missing_archive() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing.car");
    let out = tmp.path().join("out");

    let res = extract(&missing, Some(&out));
    assert!(matches!(res, Err(ExtractError::Archive(ArchiveError::NotFound(_)))));
    assert!(!out.exists());

    let res = list(&missing, Vec::new());
    assert!(matches!(res, Err(ListError::Archive(ArchiveError::NotFound(_)))));
}

#[test]
fn test_default_output_dir_is_archive_stem() {
    let tmp = TempDir::new().unwrap();
    let post = map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("a"))]);
    let car = write_car(tmp.path(), "did-plc-abc.car", &[cbor_block(1, &post)]);

    std::env::set_current_dir(tmp.path()).unwrap();
    let report = extract(&car, None).unwrap();

    assert_eq!(report.output_dir, Path::new("did-plc-abc"));
    assert_eq!(report.records_written, 1);
    assert!(tmp.path().join("did-plc-abc/app.bsky.feed.post/a.json").is_file());
}

#[test]
fn test_extract_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let blocks = vec![
        cbor_block(1, &map(vec![("did", s("did:plc:abc")), ("rev", s("7"))])),
        cbor_block(2, &map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("a")), ("n", Ipld::Integer(5))])),
        cbor_block(3, &map(vec![("$type", s("app.bsky.graph.follow")), ("subject", s("did:plc:x"))])),
    ];
    let car = write_car(tmp.path(), "repo.car", &blocks);
    let out = tmp.path().join("out");

    let snapshot = |dir: &Path| -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in fs::read_dir(&d).unwrap() {
                let p = entry.unwrap().path();
                if p.is_dir() {
                    stack.push(p);
                } else {
                    files.push((p.strip_prefix(dir).unwrap().display().to_string(), fs::read(&p).unwrap()));
                }
            }
        }
        files.sort();
        files
    };

    extract(&car, Some(&out)).unwrap();
    let first = snapshot(&out);
    extract(&car, Some(&out)).unwrap();
    assert_eq!(snapshot(&out), first);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_truncated_archive_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let post = map(vec![("$type", s("app.bsky.feed.post")), ("rkey", s("a"))]);
    let car = write_car(tmp.path(), "repo.car", &[cbor_block(1, &post), cbor_block(2, &post)]);
    let bytes = fs::read(&car).unwrap();
    fs::write(&car, &bytes[..bytes.len() - 3]).unwrap();

    let res = extract(&car, Some(&tmp.path().join("out")));
    assert!(matches!(res, Err(ExtractError::Car(_))));
}
