//! Part planning for multipart uploads.

use coldvault_treehash::LEAF_SIZE;

use crate::error::UploadError;
use crate::types::PartSpec;

/// Smallest accepted part size: 1 MiB.
pub const MIN_PART_SIZE: u64 = 1024 * 1024;

/// Largest accepted part size: 4 GiB.
pub const MAX_PART_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Validates a multipart part size.
///
/// The service requires a power of two between 1 MiB and 4 GiB. Part
/// boundaries must also fall on tree-hash leaf multiples so that per-part
/// checksums combine to the whole-archive checksum; a power of two at or
/// above the leaf size satisfies that, but the check stays explicit.
pub fn validate_part_size(part_size: u64) -> Result<(), UploadError> {
    if !part_size.is_power_of_two() {
        return Err(UploadError::InvalidPartSize(format!(
            "{part_size} bytes is not a power of two"
        )));
    }
    if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&part_size) {
        return Err(UploadError::InvalidPartSize(format!(
            "{part_size} bytes is outside {MIN_PART_SIZE}..={MAX_PART_SIZE}"
        )));
    }
    if part_size % LEAF_SIZE != 0 {
        return Err(UploadError::InvalidPartSize(format!(
            "{part_size} bytes is not a multiple of the {LEAF_SIZE}-byte leaf size"
        )));
    }
    Ok(())
}

/// Splits an archive into ordered, contiguous parts.
///
/// All parts have length `part_size` except the last, which carries the
/// remainder and is never empty. Pure: the same inputs always produce the
/// same plan.
pub fn plan_parts(archive_size: u64, part_size: u64) -> Result<Vec<PartSpec>, UploadError> {
    validate_part_size(part_size)?;
    if archive_size == 0 {
        return Err(UploadError::InvalidPartSize(
            "cannot plan parts for an empty archive".into(),
        ));
    }

    let count = archive_size.div_ceil(part_size);
    let parts = (0..count)
        .map(|i| {
            let offset = i * part_size;
            PartSpec {
                offset,
                len: part_size.min(archive_size - offset),
                index: i as u32,
            }
        })
        .collect();
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn hundred_mib_archive_in_sixteen_mib_parts() {
        let parts = plan_parts(100 * MIB, 16 * MIB).unwrap();
        assert_eq!(parts.len(), 7);
        for part in &parts[..6] {
            assert_eq!(part.len, 16 * MIB);
        }
        assert_eq!(parts[6].len, 4 * MIB);
    }

    #[test]
    fn parts_cover_archive_exactly_once() {
        for archive_size in [1, MIB - 1, MIB, MIB + 1, 10 * MIB - 1, 10 * MIB, 57 * MIB + 13] {
            let parts = plan_parts(archive_size, 2 * MIB).unwrap();

            let mut expected_offset = 0;
            for (i, part) in parts.iter().enumerate() {
                assert_eq!(part.index, i as u32);
                assert_eq!(part.offset, expected_offset);
                expected_offset += part.len;
            }
            assert_eq!(expected_offset, archive_size);

            let last = parts.last().unwrap();
            assert!(last.len > 0 && last.len <= 2 * MIB);
            for part in &parts[..parts.len() - 1] {
                assert_eq!(part.len, 2 * MIB);
            }
        }
    }

    #[test]
    fn exact_multiple_has_full_final_part() {
        let parts = plan_parts(8 * MIB, 2 * MIB).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts.last().unwrap().len, 2 * MIB);
    }

    #[test]
    fn archive_smaller_than_part_is_one_part() {
        let parts = plan_parts(100, MIB).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], PartSpec { offset: 0, len: 100, index: 0 });
    }

    #[test]
    fn plan_is_deterministic() {
        let a = plan_parts(37 * MIB + 5, 4 * MIB).unwrap();
        let b = plan_parts(37 * MIB + 5, 4 * MIB).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_non_power_of_two() {
        for part_size in [3 * MIB, 24 * MIB, MIB + 1] {
            let err = validate_part_size(part_size).unwrap_err();
            assert!(matches!(err, UploadError::InvalidPartSize(_)));
        }
    }

    #[test]
    fn rejects_out_of_bounds() {
        assert!(validate_part_size(MIB / 2).is_err());
        assert!(validate_part_size(8 * 1024 * MIB).is_err());
        assert!(validate_part_size(0).is_err());
    }

    #[test]
    fn accepts_bounds() {
        assert!(validate_part_size(MIN_PART_SIZE).is_ok());
        assert!(validate_part_size(MAX_PART_SIZE).is_ok());
        assert!(validate_part_size(16 * MIB).is_ok());
    }

    #[test]
    fn rejects_empty_archive() {
        assert!(plan_parts(0, MIB).is_err());
    }
}
