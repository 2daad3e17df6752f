// src/core/indexing/mvptree/tests/test_persistence.rs

#[cfg(test)]
mod persistence_tests {
    use std::collections::BTreeSet;
    use std::io::Cursor;
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::NamedTempFile;

    use crate::core::common::MvpTreeError;
    use crate::core::config::TreeConfig;
    use crate::core::distance::{DistanceMetric, Hamming};
    use crate::core::indexing::mvptree::persistence::{FORMAT_VERSION, MAGIC};
    use crate::core::indexing::mvptree::{MvpTree, Point, MAX_TREE_DEPTH};

    fn metric() -> Arc<dyn DistanceMetric> {
        Arc::new(Hamming)
    }

    fn sample_tree(n: usize) -> MvpTree {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = MvpTree::create(metric(), 3, 4, 3).unwrap();
        for i in 0..n {
            let len = rng.gen_range(1..8);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            tree.insert(Point::new(format!("id-{}", i), payload)).unwrap();
        }
        tree
    }

    fn records(tree: &MvpTree) -> BTreeSet<(String, Vec<u8>)> {
        tree.points().iter().map(|p| (p.id().to_string(), p.payload().to_vec())).collect()
    }

    fn format_field(err: MvpTreeError) -> &'static str {
        match err {
            MvpTreeError::Format { field, .. } => field,
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_preserves_records_and_config() {
        let mut tree = sample_tree(150);
        assert!(tree.remove("id-0"));

        let bytes = tree.to_bytes().unwrap();
        let loaded = MvpTree::from_bytes(&bytes, metric()).unwrap();

        assert_eq!(loaded.config(), tree.config());
        assert_eq!(loaded.len(), tree.len());
        assert_eq!(records(&loaded), records(&tree));
        assert_eq!(loaded.stats(), tree.stats());

        let query = [9u8, 8, 7];
        assert_eq!(loaded.knn_search(&query, 10).unwrap(), tree.knn_search(&query, 10).unwrap());

        // Sequence numbers survive, so later inserts keep ordering ties.
        let mut loaded = loaded;
        loaded.insert(Point::new("new", vec![1u8])).unwrap();
        let newest = loaded.points().into_iter().find(|p| p.id() == "new").unwrap().sequence();
        assert_eq!(newest, 150);
    }

    #[test]
    fn test_save_is_idempotent() {
        let tree = sample_tree(60);
        let mut first = Vec::new();
        let mut second = Vec::new();
        tree.save(&mut first).unwrap();
        tree.save(&mut second).unwrap();
        assert_eq!(first, second);

        let reloaded = MvpTree::load(Cursor::new(&first), metric()).unwrap();
        assert_eq!(reloaded.to_bytes().unwrap(), first);
    }

    #[test]
    fn test_empty_tree_round_trip() {
        let tree = MvpTree::create(metric(), 2, 5, 25).unwrap();
        let bytes = tree.to_bytes().unwrap();
        assert_eq!(&bytes[..4], MAGIC);

        let loaded = MvpTree::from_bytes(&bytes, metric()).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.root().is_none());
        assert_eq!(*loaded.config(), TreeConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let tree = sample_tree(40);
        let file = NamedTempFile::new().unwrap();
        tree.save_to_path(file.path()).unwrap();

        let loaded = MvpTree::load_from_path(file.path(), metric()).unwrap();
        assert_eq!(records(&loaded), records(&tree));

        let missing = file.path().with_extension("missing");
        assert!(matches!(MvpTree::load_from_path(&missing, metric()), Err(MvpTreeError::Io(_))));
    }

    #[test]
    fn test_strict_config_check() {
        let tree = sample_tree(10);
        let bytes = tree.to_bytes().unwrap();

        let same = *tree.config();
        assert!(MvpTree::load_with_config(Cursor::new(&bytes), metric(), &same).is_ok());

        let other = TreeConfig::new(2, 4, 3).unwrap();
        match MvpTree::load_with_config(Cursor::new(&bytes), metric(), &other) {
            Err(MvpTreeError::ConfigMismatch { expected, found }) => {
                assert_eq!(expected, other);
                assert_eq!(found, same);
            }
            other => panic!("expected config mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let bytes = sample_tree(12).to_bytes().unwrap();
        for len in 0..bytes.len() {
            let err = MvpTree::from_bytes(&bytes[..len], metric()).unwrap_err();
            assert!(matches!(err, MvpTreeError::Format { .. }), "prefix {}: {:?}", len, err);
        }
        assert_eq!(format_field(MvpTree::from_bytes(&[], metric()).unwrap_err()), "magic");
        assert_eq!(
            format_field(MvpTree::from_bytes(&bytes[..bytes.len() - 2], metric()).unwrap_err()),
            "checksum"
        );
    }

    #[test]
    fn test_corruption_detected_by_checksum() {
        let mut tree = MvpTree::create(metric(), 2, 5, 25).unwrap();
        tree.insert(Point::new("a", b"needle-in-haystack".to_vec())).unwrap();
        let mut bytes = tree.to_bytes().unwrap();

        let at = bytes.windows(6).position(|w| w == b"needle").unwrap();
        bytes[at] ^= 0x20;
        match MvpTree::from_bytes(&bytes, metric()).unwrap_err() {
            MvpTreeError::Format { field, offset, .. } => {
                assert_eq!(field, "checksum");
                assert_eq!(offset as usize, bytes.len() - 4);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_header_validation() {
        let bytes = sample_tree(5).to_bytes().unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert_eq!(format_field(MvpTree::from_bytes(&bad_magic, metric()).unwrap_err()), "magic");

        let mut bad_version = bytes.clone();
        bad_version[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            MvpTree::from_bytes(&bad_version, metric()),
            Err(MvpTreeError::UnsupportedVersion { found: 2, expected: 1 })
        ));

        let mut bad_config = bytes.clone();
        bad_config[8..12].copy_from_slice(&1u32.to_le_bytes());
        assert_eq!(format_field(MvpTree::from_bytes(&bad_config, metric()).unwrap_err()), "config");

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(format_field(MvpTree::from_bytes(&trailing, metric()).unwrap_err()), "trailer");
    }

    /// Builds a file by hand so the structural checks can be reached with a
    /// valid checksum.
    fn handmade(body: &[u8], point_count: u64, next_seq: u64) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        for v in [2u32, 5, 2] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&point_count.to_le_bytes());
        bytes.extend_from_slice(&next_seq.to_le_bytes());
        bytes.push(1);
        bytes.extend_from_slice(body);
        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes
    }

    fn point_bytes(seq: u64, id: &str, payload: &[u8], cache: &[f32]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&seq.to_le_bytes());
        out.extend_from_slice(&(id.len() as u32).to_le_bytes());
        out.extend_from_slice(id.as_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&(cache.len() as u32).to_le_bytes());
        for d in cache {
            out.extend_from_slice(&d.to_le_bytes());
        }
        out
    }

    fn leaf_bytes(points: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0u8];
        out.extend_from_slice(&(points.len() as u32).to_le_bytes());
        for p in points {
            out.extend_from_slice(p);
        }
        out
    }

    #[test]
    fn test_structural_validation() {
        let good = leaf_bytes(&[point_bytes(0, "a", b"x", &[])]);
        assert_eq!(MvpTree::from_bytes(&handmade(&good, 1, 1), metric()).unwrap().len(), 1);

        // Header count disagrees with the stored points.
        assert_eq!(format_field(MvpTree::from_bytes(&handmade(&good, 2, 1), metric()).unwrap_err()), "point_count");

        // Sequence number not below next_seq.
        assert_eq!(format_field(MvpTree::from_bytes(&handmade(&good, 1, 0), metric()).unwrap_err()), "point.seq");

        // Cache longer than the path length.
        let long_cache = leaf_bytes(&[point_bytes(0, "a", b"x", &[1.0; 6])]);
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&long_cache, 1, 1), metric()).unwrap_err()),
            "point.cache_len"
        );

        // Invalid UTF-8 in the id.
        let mut bad_id = point_bytes(0, "ab", b"x", &[]);
        bad_id[12] = 0xFF;
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&leaf_bytes(&[bad_id]), 1, 1), metric()).unwrap_err()),
            "point.id"
        );

        // Unknown node tag.
        assert_eq!(format_field(MvpTree::from_bytes(&handmade(&[7u8], 0, 0), metric()).unwrap_err()), "node.tag");

        // Huge payload length does not allocate, it reports the field.
        let mut huge = point_bytes(0, "a", b"", &[]);
        huge[13..17].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&leaf_bytes(&[huge]), 1, 1), metric()).unwrap_err()),
            "point.payload"
        );
    }

    fn internal_bytes(k: u32, vps: &[Vec<u8>], thresholds: &[f32], children: &[(u64, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![1u8];
        out.extend_from_slice(&k.to_le_bytes());
        for vp in vps {
            out.push(1);
            out.extend_from_slice(vp);
        }
        for t in thresholds {
            out.extend_from_slice(&t.to_le_bytes());
        }
        out.extend_from_slice(&(children.len() as u32).to_le_bytes());
        for (index, child) in children {
            out.extend_from_slice(&index.to_le_bytes());
            out.extend_from_slice(child);
        }
        out
    }

    #[test]
    fn test_internal_node_validation() {
        let vp = point_bytes(0, "vp", b"v", &[]);
        let child = leaf_bytes(&[point_bytes(1, "c", b"c", &[1.0])]);

        let good = internal_bytes(1, &[vp.clone()], &[2.0], &[(1, child.clone())]);
        let tree = MvpTree::from_bytes(&handmade(&good, 2, 2), metric()).unwrap();
        assert_eq!(tree.stats().internal_nodes, 1);

        let too_many = internal_bytes(2, &[vp.clone(), vp.clone()], &[2.0, 2.0], &[]);
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&too_many, 2, 2), metric()).unwrap_err()),
            "internal.vantage_count"
        );

        let nan = internal_bytes(1, &[vp.clone()], &[f32::NAN], &[(1, child.clone())]);
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&nan, 2, 2), metric()).unwrap_err()),
            "internal.threshold"
        );

        let out_of_range = internal_bytes(1, &[vp.clone()], &[2.0], &[(2, child.clone())]);
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&out_of_range, 2, 2), metric()).unwrap_err()),
            "child.index"
        );

        let duplicate = internal_bytes(1, &[vp], &[2.0], &[(1, child.clone()), (1, child)]);
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&duplicate, 3, 2), metric()).unwrap_err()),
            "child.index"
        );
    }

    /// `internal_nodes` single-child internal nodes above one leaf.
    fn chain_bytes(internal_nodes: usize) -> Vec<u8> {
        let mut node = leaf_bytes(&[point_bytes(internal_nodes as u64, "leaf", b"l", &[])]);
        for level in (0..internal_nodes).rev() {
            let vp = point_bytes(level as u64, &format!("vp{}", level), b"v", &[]);
            node = internal_bytes(1, &[vp], &[2.0], &[(1, node)]);
        }
        node
    }

    #[test]
    fn test_nesting_limit_matches_tree_depth() {
        let deepest = chain_bytes(MAX_TREE_DEPTH - 1);
        let count = MAX_TREE_DEPTH as u64;
        let tree = MvpTree::from_bytes(&handmade(&deepest, count, count), metric()).unwrap();
        assert_eq!(tree.stats().depth, MAX_TREE_DEPTH);
        assert_eq!(MvpTree::from_bytes(&tree.to_bytes().unwrap(), metric()).unwrap().len(), tree.len());

        let too_deep = chain_bytes(MAX_TREE_DEPTH);
        let count = count + 1;
        assert_eq!(
            format_field(MvpTree::from_bytes(&handmade(&too_deep, count, count), metric()).unwrap_err()),
            "node"
        );
    }
}
