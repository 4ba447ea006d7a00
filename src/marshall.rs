//! Conversion of a [PartTreeStorage] to and from a flat byte buffer.
//!
//! The buffer is the concatenation of the field vectors in the order
//! `inner, pstart, pend, lu, ro, split_direction, split_coord, psplit`.
//! Every element is written with a fixed width in little-endian byte order.
//! There is no header; the node count is recovered from the buffer length.

use crate::{
    error::{Error, Result},
    parttree::{FieldVisitor, FieldVisitorMut, PartTreeStorage},
};

/// A fixed width element of the wire format.
pub trait WireField: Sized + Copy {
    /// Number of bytes per element.
    const WIDTH: usize;

    /// Append the encoded element to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decode an element from exactly [WireField::WIDTH] bytes.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        Error::Decode(format!(
            "expected {} bytes for an element, got {}",
            N,
            bytes.len()
        ))
    })
}

impl WireField for bool {
    const WIDTH: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        match fixed::<1>(bytes)? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(Error::Decode(format!("invalid boolean byte {}", other))),
        }
    }
}

impl WireField for u8 {
    const WIDTH: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(fixed::<1>(bytes)?[0])
    }
}

impl WireField for i32 {
    const WIDTH: usize = 4;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(i32::from_le_bytes(fixed::<4>(bytes)?))
    }
}

impl WireField for [i32; 3] {
    const WIDTH: usize = 3 * i32::WIDTH;

    fn encode(&self, out: &mut Vec<u8>) {
        for value in self {
            value.encode(out);
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::WIDTH {
            return Err(Error::Decode(format!(
                "expected {} bytes for a coordinate, got {}",
                Self::WIDTH,
                bytes.len()
            )));
        }
        let mut coord = [0; 3];
        for (value, chunk) in coord.iter_mut().zip(bytes.chunks_exact(i32::WIDTH)) {
            *value = i32::decode(chunk)?;
        }
        Ok(coord)
    }
}

/// Exact number of bytes of the serialized tree.
pub fn marshall_size(t: &PartTreeStorage) -> usize {
    struct Size(usize);

    impl FieldVisitor for Size {
        fn visit<T: WireField>(&mut self, _name: &'static str, values: &[T]) {
            self.0 += values.len() * T::WIDTH;
        }
    }

    let mut size = Size(0);
    t.visit_fields(&mut size);
    size.0
}

/// Number of bytes per node, independent of the node count.
pub fn marshall_size_per_node(t: &PartTreeStorage) -> usize {
    struct Width(usize);

    impl FieldVisitor for Width {
        fn visit<T: WireField>(&mut self, _name: &'static str, _values: &[T]) {
            self.0 += T::WIDTH;
        }
    }

    let mut width = Width(0);
    t.visit_fields(&mut width);
    width.0
}

/// Serialize a tree into a newly allocated buffer of [marshall_size] bytes.
pub fn marshall(t: &PartTreeStorage) -> Vec<u8> {
    struct Writer(Vec<u8>);

    impl FieldVisitor for Writer {
        fn visit<T: WireField>(&mut self, _name: &'static str, values: &[T]) {
            for value in values {
                value.encode(&mut self.0);
            }
        }
    }

    let mut writer = Writer(Vec::with_capacity(marshall_size(t)));
    t.visit_fields(&mut writer);
    writer.0
}

/// Deserialize a tree written by [marshall].
///
/// Fails if the buffer length is not a multiple of the per node size,
/// if an element cannot be decoded or if the decoded tree does not pass
/// [PartTreeStorage::validate]. An empty buffer is therefore rejected too.
pub fn unmarshall(buffer: &[u8]) -> Result<PartTreeStorage> {
    struct Reader<'b> {
        rest: &'b [u8],
        nnodes: usize,
    }

    impl FieldVisitorMut for Reader<'_> {
        fn visit<T: WireField>(&mut self, name: &'static str, values: &mut Vec<T>) -> Result<()> {
            let nbytes = self.nnodes * T::WIDTH;
            if self.rest.len() < nbytes {
                return Err(Error::Decode(format!(
                    "buffer ends inside field `{}`",
                    name
                )));
            }
            let (field_bytes, rest) = self.rest.split_at(nbytes);
            self.rest = rest;

            *values = field_bytes
                .chunks_exact(T::WIDTH)
                .map(T::decode)
                .collect::<Result<Vec<T>>>()?;
            Ok(())
        }
    }

    let mut t = PartTreeStorage::default();
    let node_size = marshall_size_per_node(&t);

    if buffer.len() % node_size != 0 {
        return Err(Error::Decode(format!(
            "buffer of {} bytes is not a multiple of the node size {}",
            buffer.len(),
            node_size
        )));
    }

    let mut reader = Reader {
        rest: buffer,
        nnodes: buffer.len() / node_size,
    };
    t.visit_fields_mut(&mut reader)?;
    t.validate()?;

    Ok(t)
}

#[cfg(test)]
mod test {
    use proptest::prelude::{prop_assert_eq, proptest};

    use crate::{
        builder::make_parttree, error::Error, geometry::GridBox, splitting::quality_splitting,
    };

    use super::{marshall, marshall_size, marshall_size_per_node, unmarshall, WireField};
    use crate::parttree::PartTreeStorage;

    fn weighted_tree(nproc: usize) -> PartTreeStorage {
        make_parttree(
            nproc,
            GridBox::from_extent([12, 9, 7]).unwrap(),
            |[x, y, z]| Ok(1.0 + (x * y + z) as f64),
            quality_splitting,
        )
        .unwrap()
    }

    #[test]
    fn test_size_per_node() {
        let t = PartTreeStorage::default();
        assert_eq!(marshall_size_per_node(&t), 42);
        assert_eq!(marshall_size(&t), 0);
    }

    #[test]
    fn test_size_consistency() {
        let t = weighted_tree(6);
        assert_eq!(marshall_size(&t), t.len() * marshall_size_per_node(&t));
        assert_eq!(marshall(&t).len(), marshall_size(&t));
    }

    #[test]
    fn test_field_order() {
        let t = weighted_tree(2);
        let bytes = marshall(&t);

        // The `inner` flags of the three nodes come first.
        assert_eq!(&bytes[..3], &[1, 0, 0]);
        // Followed by `pstart` of the root.
        assert_eq!(&bytes[3..7], &0i32.to_le_bytes());
    }

    #[test]
    fn test_rejects_truncated_buffer() {
        let t = weighted_tree(3);
        let bytes = marshall(&t);

        assert!(unmarshall(&bytes[..bytes.len() - 1]).is_err());
        assert!(unmarshall(&bytes[..41]).is_err());
        assert!(matches!(unmarshall(&[]), Err(Error::InvalidTree(_))));
    }

    #[test]
    fn test_rejects_inconsistent_tree() {
        let mut t = weighted_tree(1);
        t.pstart[0] = 5;
        t.pend[0] = 6;

        // Every field decodes, but the root does not own rank 0.
        let bytes = marshall(&t);
        assert_eq!(bytes.len(), marshall_size_per_node(&t));
        assert!(matches!(unmarshall(&bytes), Err(Error::InvalidTree(_))));

        // A child box that is not the cut of its parent.
        let mut t = weighted_tree(4);
        t.ro[1][0] += 1;
        assert!(matches!(unmarshall(&marshall(&t)), Err(Error::InvalidTree(_))));
    }

    #[test]
    fn test_rejects_invalid_flag() {
        let t = weighted_tree(3);
        let mut bytes = marshall(&t);
        bytes[0] = 7;

        assert!(unmarshall(&bytes).is_err());
        assert!(bool::decode(&[2]).is_err());
    }

    proptest! {
        #[test]
        fn test_round_trip(nproc in 1usize..24) {
            let t = weighted_tree(nproc);
            let restored = unmarshall(&marshall(&t)).unwrap();
            prop_assert_eq!(&restored, &t);
            restored.validate().unwrap();
        }
    }
}
