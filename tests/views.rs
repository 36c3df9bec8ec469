use std::sync::Arc;

use hyperslab::array::{AbstractArray, MDArray};
use hyperslab::attribute::Attribute;
use hyperslab::data_type::{CompoundComponent, ExtendedDataType, NumericKind};
use hyperslab::error::MdError;
use hyperslab::group::Group;
use hyperslab::memory::MemoryGroup;
use hyperslab::options::OptionList;
use hyperslab::view::resample::{resampled, OutputGrid, PlaneSource, SourceGeoref, WarpEngine};
use hyperslab::view::MDArrayViewExt;

fn f64_type() -> ExtendedDataType {
    ExtendedDataType::numeric(NumericKind::Float64)
}

fn to_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn as_f64(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_ne_bytes(c.try_into().unwrap()))
        .collect()
}

fn array_1d(values: &[f64]) -> Arc<dyn MDArray> {
    let root = MemoryGroup::root();
    let x = root
        .create_dimension("x", "", "", values.len() as u64)
        .unwrap();
    let array = root
        .create_array("a", &[x], f64_type(), &OptionList::new())
        .unwrap();
    array
        .write(
            &[0],
            &[values.len()],
            None,
            None,
            &f64_type(),
            &to_bytes(values),
            0,
        )
        .unwrap();
    array
}

fn array_2d(rows: u64, cols: u64, values: &[f64]) -> Arc<dyn MDArray> {
    let root = MemoryGroup::root();
    let y = root.create_dimension("y", "", "", rows).unwrap();
    let x = root.create_dimension("x", "", "", cols).unwrap();
    let array = root
        .create_array("a", &[y, x], f64_type(), &OptionList::new())
        .unwrap();
    array
        .write(
            &[0, 0],
            &[rows as usize, cols as usize],
            None,
            None,
            &f64_type(),
            &to_bytes(values),
            0,
        )
        .unwrap();
    array
}

fn read_all(array: &Arc<dyn MDArray>) -> Vec<f64> {
    let count: Vec<usize> = array
        .dimensions()
        .iter()
        .map(|d| d.size() as usize)
        .collect();
    let start = vec![0u64; count.len()];
    let total: usize = count.iter().product();
    let mut out = vec![0u8; total * 8];
    array
        .read(&start, &count, None, None, &f64_type(), &mut out, 0)
        .unwrap();
    as_f64(&out)
}

#[test]
fn sliced_range() {
    let array = array_1d(&[0.0, 1.0, 2.0, 3.0, 4.0]);
    let view = array.view("[1:3]").unwrap();
    assert_eq!(view.dimensions().len(), 1);
    assert_eq!(view.dimensions()[0].size(), 2);
    assert_eq!(read_all(&view), vec![1.0, 2.0]);
}

#[test]
fn sliced_reversed() {
    let array = array_1d(&[0.0, 1.0, 2.0, 3.0, 4.0]);
    let view = array.view("[::-1]").unwrap();
    assert_eq!(view.dimensions()[0].size(), 5);
    assert_eq!(read_all(&view), vec![4.0, 3.0, 2.0, 1.0, 0.0]);
}

#[test]
fn sliced_integer_index_drops_axis() {
    let array = array_2d(2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let view = array.view("[1]").unwrap();
    assert_eq!(view.dimensionality(), 1);
    assert_eq!(view.dimensions()[0].size(), 3);
    assert_eq!(read_all(&view), vec![3.0, 4.0, 5.0]);
}

#[test]
fn sliced_newaxis_and_ellipsis() {
    let array = array_2d(2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let view = array.view("[newaxis,...]").unwrap();
    let sizes: Vec<u64> = view.dimensions().iter().map(|d| d.size()).collect();
    assert_eq!(sizes, vec![1, 2, 3]);
    assert_eq!(read_all(&view), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn sliced_views_compose() {
    let array = array_2d(2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let view = array.view("[1][::2]").unwrap();
    assert_eq!(read_all(&view), vec![3.0, 5.0]);
}

#[test]
fn sliced_writes_reach_the_parent() {
    let array = array_1d(&[0.0, 1.0, 2.0, 3.0, 4.0]);
    let view = array.view("[1:4]").unwrap();
    view.write(&[0], &[3], None, None, &f64_type(), &to_bytes(&[9.0, 8.0, 7.0]), 0)
        .unwrap();
    assert_eq!(read_all(&array), vec![0.0, 9.0, 8.0, 7.0, 4.0]);
}

#[test]
fn slice_expression_errors() {
    let array = array_1d(&[0.0, 1.0, 2.0]);
    for expr in ["0", "[]", "[0", "[9]", "[1:1]", "[...,...]"] {
        let err = array.view(expr).unwrap_err();
        assert!(
            matches!(err, MdError::IllegalArgument(_)),
            "{expr}: {err}"
        );
    }
    let err = array.view("['f']").unwrap_err();
    assert!(err
        .to_string()
        .contains("field access not allowed on non-compound data type"));
}

#[test]
fn transposed_swaps_axes() {
    let array = array_2d(2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let view = array.transposed(&[Some(1), Some(0)]).unwrap();
    let sizes: Vec<u64> = view.dimensions().iter().map(|d| d.size()).collect();
    assert_eq!(sizes, vec![3, 2]);
    assert_eq!(read_all(&view), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
}

#[test]
fn transposed_inserts_new_axes() {
    let array = array_2d(2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let view = array.transposed(&[None, Some(0), Some(1)]).unwrap();
    let sizes: Vec<u64> = view.dimensions().iter().map(|d| d.size()).collect();
    assert_eq!(sizes, vec![1, 2, 3]);
}

#[test]
fn transposed_rejects_bad_maps() {
    let array = array_2d(2, 3, &[0.0; 6]);
    assert!(array.transposed(&[Some(0), Some(0)]).is_err());
    assert!(array.transposed(&[Some(0)]).is_err());
    assert!(array.transposed(&[Some(0), Some(2)]).is_err());
}

#[test]
fn field_extraction() {
    let i32_type = ExtendedDataType::numeric(NumericKind::Int32);
    let compound = ExtendedDataType::compound(
        "pair",
        16,
        vec![
            CompoundComponent::new("a", 0, i32_type),
            CompoundComponent::new("b", 8, f64_type()),
        ],
    )
    .unwrap();
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 2).unwrap();
    let array = root
        .create_array("c", &[x], compound.clone(), &OptionList::new())
        .unwrap();
    let mut raw = Vec::new();
    for (a, b) in [(1i32, 1.5f64), (2, 2.5)] {
        raw.extend_from_slice(&a.to_ne_bytes());
        raw.extend_from_slice(&[0u8; 4]);
        raw.extend_from_slice(&b.to_ne_bytes());
    }
    array
        .write(&[0], &[2], None, None, &compound, &raw, 0)
        .unwrap();

    let field = array.field_view("b").unwrap();
    assert_eq!(field.data_type(), &f64_type());
    assert_eq!(read_all(&field), vec![1.5, 2.5]);

    let via_expr = array.view("['b']").unwrap();
    assert_eq!(read_all(&via_expr), vec![1.5, 2.5]);

    assert!(array.field_view("missing").is_err());
}

#[test]
fn unscaled_round_trip() {
    let i32_type = ExtendedDataType::numeric(NumericKind::Int32);
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 1).unwrap();
    let array = root
        .create_array("a", &[x], i32_type.clone(), &OptionList::new())
        .unwrap();
    array.set_scale(Some(2.0)).unwrap();
    array.set_offset(Some(1.0)).unwrap();
    array
        .write(&[0], &[1], None, None, &i32_type, &3i32.to_ne_bytes(), 0)
        .unwrap();

    let view = array.unscaled().unwrap();
    assert_eq!(view.data_type(), &f64_type());
    assert_eq!(read_all(&view), vec![7.0]);
    // the view does not re-expose the packing it applies
    assert_eq!(view.scale(), None);
    assert_eq!(view.offset(), None);

    view.write(&[0], &[1], None, None, &f64_type(), &9.0f64.to_ne_bytes(), 0)
        .unwrap();
    let mut raw = [0u8; 4];
    array
        .read(&[0], &[1], None, None, &i32_type, &mut raw, 0)
        .unwrap();
    assert_eq!(i32::from_ne_bytes(raw), 4);
}

#[test]
fn unscaled_complex_write_maps_nodata() {
    let c64_type = ExtendedDataType::numeric(NumericKind::CFloat64);
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 3).unwrap();
    let array = root
        .create_array("a", &[x], c64_type.clone(), &OptionList::new())
        .unwrap();
    array.set_scale(Some(2.0)).unwrap();
    array.set_offset(Some(1.0)).unwrap();
    array.set_nodata_f64(-1.0).unwrap();

    let view = array.unscaled().unwrap();
    assert_eq!(view.data_type(), &c64_type);
    // a NaN and the raw nodata sentinel both write back as nodata
    let values = to_bytes(&[5.0, 4.0, f64::NAN, 0.0, -1.0, 9.0]);
    view.write(&[0], &[3], None, None, &c64_type, &values, 0)
        .unwrap();

    let mut raw = vec![0u8; 3 * 16];
    array
        .read(&[0], &[3], None, None, &c64_type, &mut raw, 0)
        .unwrap();
    assert_eq!(as_f64(&raw), vec![2.0, 2.0, -1.0, -1.0, -1.0, -1.0]);
}

#[test]
fn unscaled_without_packing_is_identity() {
    let array = array_1d(&[1.0]);
    let view = array.unscaled().unwrap();
    assert_eq!(view.data_type(), array.data_type());
    assert_eq!(view.full_name(), array.full_name());
}

fn read_mask(array: &Arc<dyn MDArray>) -> Vec<u8> {
    let mask = array.masked().unwrap();
    let count: Vec<usize> = mask
        .dimensions()
        .iter()
        .map(|d| d.size() as usize)
        .collect();
    let start = vec![0u64; count.len()];
    let total: usize = count.iter().product();
    let mut out = vec![0u8; total];
    mask.read(
        &start,
        &count,
        None,
        None,
        &ExtendedDataType::numeric(NumericKind::UInt8),
        &mut out,
        0,
    )
    .unwrap();
    out
}

#[test]
fn mask_honours_fill_value_attribute() {
    let array = array_1d(&[1.0, 9999.0, 3.0]);
    let attr = array
        .create_attribute("_FillValue", &[], f64_type(), &OptionList::new())
        .unwrap();
    attr.write_f64(9999.0).unwrap();
    assert_eq!(read_mask(&array), vec![1, 0, 1]);
}

#[test]
fn mask_honours_valid_range() {
    let array = array_1d(&[1.0, 3.0, 5.0]);
    let attr = array
        .create_attribute("valid_range", &[2], f64_type(), &OptionList::new())
        .unwrap();
    attr.write_f64_slice(&[2.0, 4.0]).unwrap();
    assert_eq!(read_mask(&array), vec![0, 1, 0]);
}

#[test]
fn mask_honours_nodata() {
    let array = array_1d(&[1.0, 2.0, 3.0]);
    array.set_nodata_f64(2.0).unwrap();
    assert_eq!(read_mask(&array), vec![1, 0, 1]);
}

#[test]
fn mask_treats_nan_as_invalid() {
    // no nodata and no attributes: NaN is still not a valid element
    let array = array_1d(&[1.0, f64::NAN, 3.0]);
    assert_eq!(read_mask(&array), vec![1, 0, 1]);
}

#[test]
fn mask_fill_value_wins_inside_valid_range() {
    let array = array_1d(&[1.0, 3.0, f64::NAN]);
    let fill = array
        .create_attribute("_FillValue", &[], f64_type(), &OptionList::new())
        .unwrap();
    fill.write_f64(3.0).unwrap();
    let range = array
        .create_attribute("valid_range", &[2], f64_type(), &OptionList::new())
        .unwrap();
    range.write_f64_slice(&[2.0, 4.0]).unwrap();
    // 1.0 is below the range, 3.0 matches the fill value despite being in
    // range, NaN is never valid
    assert_eq!(read_mask(&array), vec![0, 0, 0]);
}

#[test]
fn mask_of_plain_integer_array_is_all_valid() {
    let i32_type = ExtendedDataType::numeric(NumericKind::Int32);
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 3).unwrap();
    let array = root
        .create_array("a", &[x], i32_type, &OptionList::new())
        .unwrap();
    assert_eq!(read_mask(&array), vec![1, 1, 1]);
}

#[test]
fn mask_rejects_non_numeric_arrays() {
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 2).unwrap();
    let array = root
        .create_array("s", &[x], ExtendedDataType::string(0), &OptionList::new())
        .unwrap();
    assert!(matches!(
        array.masked().unwrap_err(),
        MdError::NotSupported(_)
    ));
}

struct PassthroughEngine;

impl WarpEngine for PassthroughEngine {
    fn warp_plane(
        &self,
        source: &dyn PlaneSource,
        source_georef: &SourceGeoref,
        _output: &OutputGrid,
        resampling: &str,
        out: &mut [f64],
    ) -> Result<(), MdError> {
        assert_eq!(resampling, "nearest");
        if !matches!(source_georef, SourceGeoref::Affine(_)) {
            return Err(MdError::illegal("expected an affine source georeferencing"));
        }
        let rows = usize::try_from(source.height()).unwrap();
        source.read_rows(0, rows, out)
    }
}

#[test]
fn resampled_plane_passthrough() {
    let root = MemoryGroup::root();
    let y = root
        .create_dimension("y", "HORIZONTAL_Y", "NORTH", 2)
        .unwrap();
    let x = root
        .create_dimension("x", "HORIZONTAL_X", "EAST", 2)
        .unwrap();
    let y_var = root
        .create_array("y", &[y.clone()], f64_type(), &OptionList::new())
        .unwrap();
    y_var
        .write(&[0], &[2], None, None, &f64_type(), &to_bytes(&[10.0, 8.0]), 0)
        .unwrap();
    let x_var = root
        .create_array("x", &[x.clone()], f64_type(), &OptionList::new())
        .unwrap();
    x_var
        .write(&[0], &[2], None, None, &f64_type(), &to_bytes(&[0.5, 1.5]), 0)
        .unwrap();
    y.set_indexing_variable(y_var).unwrap();
    x.set_indexing_variable(x_var).unwrap();
    let array = root
        .create_array("t", &[y, x], f64_type(), &OptionList::new())
        .unwrap();
    array
        .write(
            &[0, 0],
            &[2, 2],
            None,
            None,
            &f64_type(),
            &to_bytes(&[1.0, 2.0, 3.0, 4.0]),
            0,
        )
        .unwrap();

    let output = OutputGrid {
        width: 2,
        height: 2,
        geo_transform: [0.0, 1.0, 0.0, 11.0, 0.0, -2.0],
        srs_wkt: Some("LOCAL_CS[\"arbitrary\"]".to_string()),
    };
    let view = resampled(array, Arc::new(PassthroughEngine), output, "nearest").unwrap();
    let names: Vec<&str> = view.dimensions().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["resampled_y", "resampled_x"]);
    assert_eq!(view.spatial_ref().as_deref(), Some("LOCAL_CS[\"arbitrary\"]"));
    assert_eq!(read_all(&view), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn resampled_requires_indexing_variables() {
    let array = array_2d(2, 2, &[0.0; 4]);
    let output = OutputGrid {
        width: 2,
        height: 2,
        geo_transform: [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        srs_wkt: None,
    };
    assert!(matches!(
        resampled(array, Arc::new(PassthroughEngine), output, "nearest").unwrap_err(),
        MdError::NotSupported(_)
    ));
}
