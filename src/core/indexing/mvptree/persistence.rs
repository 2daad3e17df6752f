// src/core/indexing/mvptree/persistence.rs

//! Binary encoding of a whole tree.
//!
//! Little-endian layout:
//!
//! ```text
//! magic "MVPT" | version u32 | branch_factor u32 | path_length u32 | leaf_capacity u32
//! | point_count u64 | next_seq u64 | root_present u8 | [node] | crc32 u32
//!
//! node     := tag u8 (0 = leaf, 1 = internal)
//! leaf     := n u32 | n x point
//! internal := k u32 | k x (live u8 | point) | k x (branch_factor - 1) x f32
//!             | c u32 | c x (child_index u64 | node)
//! point    := seq u64 | id_len u32 | id | payload_len u32 | payload | cache_len u32 | cache_len x f32
//! ```
//!
//! The checksum covers every byte before it. Nodes nest at most
//! [`MAX_TREE_DEPTH`] levels, the same bound insertion keeps.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::info;

use crate::core::common::{MvpTreeError, Result};
use crate::core::config::TreeConfig;
use crate::core::distance::DistanceMetric;
use crate::core::indexing::mvptree::node::{Node, VantagePoint, MAX_TREE_DEPTH};
use crate::core::indexing::mvptree::point::Point;
use crate::core::indexing::mvptree::tree::MvpTree;

pub const MAGIC: &[u8; 4] = b"MVPT";
pub const FORMAT_VERSION: u32 = 1;

const TAG_LEAF: u8 = 0;
const TAG_INTERNAL: u8 = 1;

impl MvpTree {
    /// Encodes the tree into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_all(MAGIC)?;
        buf.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        buf.write_u32::<LittleEndian>(to_u32(self.config.branch_factor, "branch_factor")?)?;
        buf.write_u32::<LittleEndian>(to_u32(self.config.path_length, "path_length")?)?;
        buf.write_u32::<LittleEndian>(to_u32(self.config.leaf_capacity, "leaf_capacity")?)?;
        buf.write_u64::<LittleEndian>(self.count as u64)?;
        buf.write_u64::<LittleEndian>(self.next_seq)?;
        match &self.root {
            Some(root) => {
                buf.write_u8(1)?;
                write_node(&mut buf, root, 1)?;
            }
            None => buf.write_u8(0)?,
        }
        let checksum = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(checksum)?;
        Ok(buf)
    }

    /// Decodes a tree, attaching `metric` to it.
    pub fn from_bytes(bytes: &[u8], metric: Arc<dyn DistanceMetric>) -> Result<Self> {
        Decoder::new(bytes).decode(metric, None)
    }

    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        info!(points = self.count, bytes = bytes.len(), "saved mvp tree");
        Ok(())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.save(BufWriter::new(file))
    }

    /// Loads a tree using the configuration stored in its header.
    pub fn load<R: Read>(reader: R, metric: Arc<dyn DistanceMetric>) -> Result<Self> {
        load_inner(reader, metric, None)
    }

    /// Loads a tree whose stored configuration must equal `expected`.
    ///
    /// # Errors
    ///
    /// Returns `MvpTreeError::ConfigMismatch` when the header differs.
    pub fn load_with_config<R: Read>(
        reader: R,
        metric: Arc<dyn DistanceMetric>,
        expected: &TreeConfig,
    ) -> Result<Self> {
        load_inner(reader, metric, Some(expected))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P, metric: Arc<dyn DistanceMetric>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::load(BufReader::new(file), metric)
    }
}

fn load_inner<R: Read>(
    mut reader: R,
    metric: Arc<dyn DistanceMetric>,
    expected: Option<&TreeConfig>,
) -> Result<MvpTree> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let tree = Decoder::new(&bytes).decode(metric, expected)?;
    info!(points = tree.count, bytes = bytes.len(), "loaded mvp tree");
    Ok(tree)
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| MvpTreeError::invalid_argument(format!("{} {} does not fit in u32", what, value)))
}

fn write_len<W: Write>(w: &mut W, len: usize, what: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(to_u32(len, what)?)?;
    Ok(())
}

fn write_point<W: Write>(w: &mut W, point: &Point) -> Result<()> {
    w.write_u64::<LittleEndian>(point.seq)?;
    write_len(w, point.id().len(), "id length")?;
    w.write_all(point.id().as_bytes())?;
    write_len(w, point.payload().len(), "payload length")?;
    w.write_all(point.payload())?;
    write_len(w, point.path.len(), "cache length")?;
    for d in &point.path {
        w.write_f32::<LittleEndian>(*d)?;
    }
    Ok(())
}

/// Writes `node`, found at `depth`. Refuses anything the decoder would reject
/// for its nesting.
fn write_node<W: Write>(w: &mut W, node: &Node, depth: usize) -> Result<()> {
    let limit = if node.is_leaf() { MAX_TREE_DEPTH } else { MAX_TREE_DEPTH - 1 };
    if depth > limit {
        return Err(MvpTreeError::invalid_argument(format!(
            "node at depth {} exceeds the maximum tree depth {}",
            depth, MAX_TREE_DEPTH
        )));
    }
    match node {
        Node::Leaf { points } => {
            w.write_u8(TAG_LEAF)?;
            write_len(w, points.len(), "leaf size")?;
            for point in points {
                write_point(w, point)?;
            }
        }
        Node::Internal { vantage_points, boundaries, children } => {
            w.write_u8(TAG_INTERNAL)?;
            write_len(w, vantage_points.len(), "vantage point count")?;
            for vp in vantage_points {
                w.write_u8(u8::from(vp.live))?;
                write_point(w, &vp.point)?;
            }
            for t in boundaries.iter().flatten() {
                w.write_f32::<LittleEndian>(*t)?;
            }
            write_len(w, children.len(), "child count")?;
            for (index, child) in children {
                w.write_u64::<LittleEndian>(*index)?;
                write_node(w, child, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Reads a tree back from a byte slice, tracking offsets for diagnostics.
struct Decoder<'a> {
    bytes: &'a [u8],
    cursor: Cursor<&'a [u8]>,
    config: TreeConfig,
    next_seq: u64,
    live: u64,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: Cursor::new(bytes), config: TreeConfig::default(), next_seq: 0, live: 0 }
    }

    fn offset(&self) -> u64 {
        self.cursor.position()
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset() as usize)
    }

    fn truncated(offset: u64, field: &'static str) -> MvpTreeError {
        MvpTreeError::format(offset, field, "unexpected end of input")
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        let offset = self.offset();
        self.cursor.read_u8().map_err(|_| Self::truncated(offset, field))
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32> {
        let offset = self.offset();
        self.cursor.read_u32::<LittleEndian>().map_err(|_| Self::truncated(offset, field))
    }

    fn read_u64(&mut self, field: &'static str) -> Result<u64> {
        let offset = self.offset();
        self.cursor.read_u64::<LittleEndian>().map_err(|_| Self::truncated(offset, field))
    }

    fn read_f32(&mut self, field: &'static str) -> Result<f32> {
        let offset = self.offset();
        self.cursor.read_f32::<LittleEndian>().map_err(|_| Self::truncated(offset, field))
    }

    fn read_flag(&mut self, field: &'static str) -> Result<bool> {
        let offset = self.offset();
        match self.read_u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(MvpTreeError::format(offset, field, format!("expected 0 or 1, got {}", other))),
        }
    }

    /// Reads `len` bytes without trusting `len` for an up-front allocation.
    fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>> {
        let offset = self.offset();
        if len > self.remaining() {
            return Err(MvpTreeError::format(
                offset,
                field,
                format!("length {} exceeds the {} remaining bytes", len, self.remaining()),
            ));
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)?;
        buf.resize(len, 0);
        self.cursor.read_exact(&mut buf).map_err(|_| Self::truncated(offset, field))?;
        Ok(buf)
    }

    fn decode(mut self, metric: Arc<dyn DistanceMetric>, expected: Option<&TreeConfig>) -> Result<MvpTree> {
        let magic = self.read_bytes(MAGIC.len(), "magic")?;
        if magic != MAGIC {
            return Err(MvpTreeError::format(0, "magic", format!("expected {:?}, got {:?}", MAGIC, magic)));
        }
        let version = self.read_u32("version")?;
        if version != FORMAT_VERSION {
            return Err(MvpTreeError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
        }

        let config_offset = self.offset();
        let branch_factor = self.read_u32("branch_factor")? as usize;
        let path_length = self.read_u32("path_length")? as usize;
        let leaf_capacity = self.read_u32("leaf_capacity")? as usize;
        let config = TreeConfig::new(branch_factor, path_length, leaf_capacity)
            .map_err(|e| MvpTreeError::format(config_offset, "config", e.to_string()))?;
        if let Some(expected) = expected {
            if *expected != config {
                return Err(MvpTreeError::ConfigMismatch { expected: *expected, found: config });
            }
        }
        self.config = config;

        let count_offset = self.offset();
        let point_count = self.read_u64("point_count")?;
        self.next_seq = self.read_u64("next_seq")?;
        let root = if self.read_flag("root_present")? { Some(self.node(1)?) } else { None };

        let checksum_offset = self.offset();
        let stored = self.read_u32("checksum")?;
        let computed = crc32fast::hash(&self.bytes[..checksum_offset as usize]);
        if stored != computed {
            return Err(MvpTreeError::format(
                checksum_offset,
                "checksum",
                format!("stored {:#010x}, computed {:#010x}", stored, computed),
            ));
        }
        if self.remaining() > 0 {
            return Err(MvpTreeError::format(
                self.offset(),
                "trailer",
                format!("{} unexpected trailing bytes", self.remaining()),
            ));
        }
        if self.live != point_count {
            return Err(MvpTreeError::format(
                count_offset,
                "point_count",
                format!("header says {} points, found {}", point_count, self.live),
            ));
        }

        let count = usize::try_from(point_count)
            .map_err(|_| MvpTreeError::format(count_offset, "point_count", "too many points"))?;
        Ok(MvpTree { config, metric, root, count, next_seq: self.next_seq })
    }

    /// Reads the node at `depth`; leaves may sit at `MAX_TREE_DEPTH`,
    /// internal nodes only above it.
    fn node(&mut self, depth: usize) -> Result<Node> {
        let offset = self.offset();
        match self.read_u8("node.tag")? {
            TAG_LEAF if depth <= MAX_TREE_DEPTH => self.leaf(),
            TAG_INTERNAL if depth < MAX_TREE_DEPTH => self.internal(depth),
            TAG_LEAF | TAG_INTERNAL => Err(MvpTreeError::format(
                offset,
                "node",
                format!("nesting deeper than {} levels", MAX_TREE_DEPTH),
            )),
            other => Err(MvpTreeError::format(offset, "node.tag", format!("unknown node tag {}", other))),
        }
    }

    fn leaf(&mut self) -> Result<Node> {
        let offset = self.offset();
        let n = self.read_u32("leaf.size")?;
        if n == 0 {
            return Err(MvpTreeError::format(offset, "leaf.size", "empty leaf"));
        }
        let mut points = Vec::new();
        for _ in 0..n {
            points.push(self.point()?);
            self.live += 1;
        }
        Ok(Node::Leaf { points })
    }

    fn internal(&mut self, depth: usize) -> Result<Node> {
        let branch_factor = self.config.branch_factor;
        let offset = self.offset();
        let k = self.read_u32("internal.vantage_count")? as usize;
        if !(1..=self.config.max_vantage_points()).contains(&k) {
            return Err(MvpTreeError::format(
                offset,
                "internal.vantage_count",
                format!("{} vantage points, expected 1..={}", k, self.config.max_vantage_points()),
            ));
        }

        let mut vantage_points = Vec::with_capacity(k);
        for _ in 0..k {
            let live = self.read_flag("vantage.live")?;
            let point = self.point()?;
            if live {
                self.live += 1;
            }
            vantage_points.push(VantagePoint { point, live });
        }

        let mut boundaries = Vec::with_capacity(k);
        for _ in 0..k {
            let mut thresholds = Vec::with_capacity(branch_factor - 1);
            for _ in 1..branch_factor {
                let offset = self.offset();
                let t = self.read_f32("internal.threshold")?;
                if t.is_nan() {
                    return Err(MvpTreeError::format(offset, "internal.threshold", "NaN threshold"));
                }
                if thresholds.last().is_some_and(|prev| t < *prev) {
                    return Err(MvpTreeError::format(offset, "internal.threshold", "thresholds decrease"));
                }
                thresholds.push(t);
            }
            boundaries.push(thresholds);
        }

        let fanout = self.config.fanout(k).unwrap_or(u64::MAX);
        let offset = self.offset();
        let c = self.read_u32("internal.child_count")?;
        if u64::from(c) > fanout {
            return Err(MvpTreeError::format(
                offset,
                "internal.child_count",
                format!("{} children, at most {} allowed", c, fanout),
            ));
        }
        let mut children = BTreeMap::new();
        for _ in 0..c {
            let offset = self.offset();
            let index = self.read_u64("child.index")?;
            if index >= fanout {
                return Err(MvpTreeError::format(
                    offset,
                    "child.index",
                    format!("child index {} out of range 0..{}", index, fanout),
                ));
            }
            let child = self.node(depth + 1)?;
            if children.insert(index, child).is_some() {
                return Err(MvpTreeError::format(offset, "child.index", format!("duplicate child index {}", index)));
            }
        }

        Ok(Node::Internal { vantage_points, boundaries, children })
    }

    fn point(&mut self) -> Result<Point> {
        let offset = self.offset();
        let seq = self.read_u64("point.seq")?;
        if seq >= self.next_seq {
            return Err(MvpTreeError::format(
                offset,
                "point.seq",
                format!("sequence {} not below next_seq {}", seq, self.next_seq),
            ));
        }

        let id_len = self.read_u32("point.id_len")? as usize;
        let id_offset = self.offset();
        let id = String::from_utf8(self.read_bytes(id_len, "point.id")?)
            .map_err(|e| MvpTreeError::format(id_offset, "point.id", e.to_string()))?;

        let payload_len = self.read_u32("point.payload_len")? as usize;
        let payload = self.read_bytes(payload_len, "point.payload")?;

        let cache_offset = self.offset();
        let cache_len = self.read_u32("point.cache_len")? as usize;
        if cache_len > self.config.path_length {
            return Err(MvpTreeError::format(
                cache_offset,
                "point.cache_len",
                format!("{} cached distances, path length is {}", cache_len, self.config.path_length),
            ));
        }
        let mut path = Vec::with_capacity(cache_len);
        for _ in 0..cache_len {
            path.push(self.read_f32("point.cache")?);
        }

        Ok(Point::from_parts(id, payload, seq, path))
    }
}
