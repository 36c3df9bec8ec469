use std::sync::Arc;

use hyperslab::array::{AbstractArray, MDArray};
use hyperslab::attribute::Attribute;
use hyperslab::data_type::{ExtendedDataType, NumericKind};
use hyperslab::error::MdError;
use hyperslab::group::copy::{copy_group, total_copy_cost};
use hyperslab::group::{open_array_from_full_name, Group};
use hyperslab::memory::MemoryGroup;
use hyperslab::options::OptionList;
use hyperslab::statistics::{
    compute_statistics, MemoryStatisticsCache, Statistics, StatisticsCache,
};
use hyperslab::view::MDArrayViewExt;

fn f64_type() -> ExtendedDataType {
    ExtendedDataType::numeric(NumericKind::Float64)
}

fn to_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
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

fn as_f64(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_ne_bytes(c.try_into().unwrap()))
        .collect()
}

fn write_all(array: &Arc<dyn MDArray>, values: &[f64]) {
    let count: Vec<usize> = array
        .dimensions()
        .iter()
        .map(|d| d.size() as usize)
        .collect();
    let start = vec![0u64; count.len()];
    array
        .write(&start, &count, None, None, &f64_type(), &to_bytes(values), 0)
        .unwrap();
}

/// y(2) x(3) hierarchy with a 2x3 array `t`, metadata, and a subgroup.
fn sample_source() -> Arc<dyn Group> {
    let src = MemoryGroup::root();
    let y = src.create_dimension("y", "", "", 2).unwrap();
    let x = src.create_dimension("x", "", "", 3).unwrap();
    let t = src
        .create_array("t", &[y, x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&t, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    t.set_unit("K").unwrap();
    t.set_nodata_f64(255.0).unwrap();
    t.set_spatial_ref(Some("LOCAL_CS[\"arbitrary\"]")).unwrap();
    t.create_attribute("long_name", &[], ExtendedDataType::string(0), &OptionList::new())
        .unwrap()
        .write_string("temperature")
        .unwrap();
    src.create_attribute("title", &[], ExtendedDataType::string(0), &OptionList::new())
        .unwrap()
        .write_string("demo")
        .unwrap();
    let sub = src.create_group("sub", &OptionList::new()).unwrap();
    let z = sub.create_dimension("z", "", "", 2).unwrap();
    let s = sub
        .create_array("s", &[z], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&s, &[6.0, 7.0]);
    src
}

#[test]
fn total_copy_cost_accounts_for_payload() {
    let src = MemoryGroup::root();
    let y = src.create_dimension("y", "", "", 2).unwrap();
    let x = src.create_dimension("x", "", "", 3).unwrap();
    src.create_array("t", &[y, x], f64_type(), &OptionList::new())
        .unwrap();
    let src: Arc<dyn Group> = src;
    // group + array + 6 f64 elements
    assert_eq!(total_copy_cost(&src), 1000 + 1000 + 48);
}

#[test]
fn deep_copy_recreates_the_hierarchy() {
    let src = sample_source();
    let dst: Arc<dyn Group> = MemoryGroup::root();
    copy_group(&dst, &dst, &src, true, &OptionList::new(), None).unwrap();

    let t = dst.open_array("t").unwrap();
    assert_eq!(read_all(&t), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(t.unit(), "K");
    assert_eq!(t.nodata_as_f64(), Some(255.0));
    assert_eq!(t.spatial_ref().as_deref(), Some("LOCAL_CS[\"arbitrary\"]"));
    assert_eq!(
        t.attribute("long_name").unwrap().read_as_string().unwrap(),
        "temperature"
    );
    assert_eq!(
        dst.attribute("title").unwrap().read_as_string().unwrap(),
        "demo"
    );
    let dim_names: Vec<String> = dst
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(dim_names, vec!["x".to_string(), "y".to_string()]);

    let s = open_array_from_full_name(&dst, "/sub/s").unwrap();
    assert_eq!(read_all(&s), vec![6.0, 7.0]);
}

#[test]
fn deep_copy_progress_is_monotone() {
    let src = sample_source();
    let dst: Arc<dyn Group> = MemoryGroup::root();
    let mut seen: Vec<f64> = Vec::new();
    let mut progress = |fraction: f64| {
        seen.push(fraction);
        true
    };
    copy_group(
        &dst,
        &dst,
        &src,
        true,
        &OptionList::new(),
        Some(&mut progress),
    )
    .unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[1] >= w[0]));
    assert!((seen.last().unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn deep_copy_can_be_cancelled() {
    let src = sample_source();
    let dst: Arc<dyn Group> = MemoryGroup::root();
    let mut progress = |_: f64| false;
    let err = copy_group(
        &dst,
        &dst,
        &src,
        true,
        &OptionList::new(),
        Some(&mut progress),
    )
    .unwrap_err();
    assert!(matches!(err, MdError::Stopped));
}

#[test]
fn deep_copy_strictness() {
    let src = MemoryGroup::root();
    let x = src.create_dimension("x", "", "", 3).unwrap();
    let t = src
        .create_array("t", &[x.clone()], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&t, &[1.0, 2.0, 3.0]);
    let u = src
        .create_array("u", &[x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&u, &[4.0, 5.0, 6.0]);
    let src: Arc<dyn Group> = src;

    // a dimension x and an array t already exist in the destination
    let dst = MemoryGroup::root();
    let dst_x = dst.create_dimension("x", "", "", 3).unwrap();
    dst.create_array("t", &[dst_x], f64_type(), &OptionList::new())
        .unwrap();
    let dst: Arc<dyn Group> = dst;

    let err = copy_group(&dst, &dst, &src, true, &OptionList::new(), None).unwrap_err();
    assert!(matches!(err, MdError::IllegalArgument(_)));

    // a non-strict copy skips the collision and copies the rest
    let dst2 = MemoryGroup::root();
    let dst2_x = dst2.create_dimension("x", "", "", 3).unwrap();
    dst2.create_array("t", &[dst2_x], f64_type(), &OptionList::new())
        .unwrap();
    let dst2: Arc<dyn Group> = dst2;
    copy_group(&dst2, &dst2, &src, false, &OptionList::new(), None).unwrap();
    let copied = dst2.open_array("u").unwrap();
    assert_eq!(read_all(&copied), vec![4.0, 5.0, 6.0]);
}

#[test]
fn deep_copy_disambiguates_colliding_dimensions() {
    let src = MemoryGroup::root();
    let root_x = src.create_dimension("x", "", "", 3).unwrap();
    let sub = src.create_group("sub", &OptionList::new()).unwrap();
    let sub_x = sub.create_dimension("x", "", "", 4).unwrap();
    let a = sub
        .create_array("a", &[root_x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&a, &[1.0, 2.0, 3.0]);
    sub.create_array("b", &[sub_x], f64_type(), &OptionList::new())
        .unwrap();

    // copying the subgroup alone leaves the root dimension unresolvable, so
    // the copy creates one named after the referencing array
    let dst: Arc<dyn Group> = MemoryGroup::root();
    copy_group(&dst, &dst, &sub, true, &OptionList::new(), None).unwrap();
    let mut dims: Vec<(String, u64)> = dst
        .dimensions()
        .iter()
        .map(|d| (d.name().to_string(), d.size()))
        .collect();
    dims.sort();
    assert_eq!(
        dims,
        vec![("x".to_string(), 4), ("x_a".to_string(), 3)]
    );
    let copied = dst.open_array("a").unwrap();
    assert_eq!(copied.dimensions()[0].name(), "x_a");
    assert_eq!(read_all(&copied), vec![1.0, 2.0, 3.0]);
}

#[test]
fn deep_copy_relinks_indexing_variables() {
    let src = MemoryGroup::root();
    let x = src.create_dimension("x", "", "", 2).unwrap();
    let x_var = src
        .create_array("x", &[x.clone()], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&x_var, &[0.5, 1.5]);
    x.set_indexing_variable(x_var).unwrap();
    let src: Arc<dyn Group> = src;

    let dst: Arc<dyn Group> = MemoryGroup::root();
    copy_group(&dst, &dst, &src, true, &OptionList::new(), None).unwrap();
    let dim = dst
        .dimensions()
        .into_iter()
        .find(|d| d.name() == "x")
        .unwrap();
    let var = dim.indexing_variable().unwrap();
    assert_eq!(var.full_name(), "/x");
    assert_eq!(read_all(&var), vec![0.5, 1.5]);
}

#[test]
fn deep_copy_autoscale() {
    let src = MemoryGroup::root();
    let x = src.create_dimension("x", "", "", 2).unwrap();
    let t = src
        .create_array("t", &[x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&t, &[0.0, 10.0]);
    let src: Arc<dyn Group> = src;

    let dst: Arc<dyn Group> = MemoryGroup::root();
    let options = OptionList::from_slice(&["AUTOSCALE=YES"]);
    copy_group(&dst, &dst, &src, true, &options, None).unwrap();

    let copied = dst.open_array("t").unwrap();
    assert_eq!(
        copied.data_type(),
        &ExtendedDataType::numeric(NumericKind::UInt16)
    );
    assert_eq!(copied.offset(), Some(0.0));
    let scale = copied.scale().unwrap();
    assert!((scale - 10.0 / 65535.0).abs() < 1e-12);

    let mut raw = [0u8; 4];
    copied
        .read(
            &[0],
            &[2],
            None,
            None,
            &ExtendedDataType::numeric(NumericKind::UInt16),
            &mut raw,
            0,
        )
        .unwrap();
    let packed: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_ne_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(packed, vec![0, 65535]);

    // unpacking the copy restores the source values
    let unpacked = copied.unscaled().unwrap();
    let values = read_all(&unpacked);
    assert!((values[0] - 0.0).abs() < 1e-3);
    assert!((values[1] - 10.0).abs() < 1e-3);
}

#[test]
fn statistics_over_all_elements() {
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 5).unwrap();
    let array = root
        .create_array("a", &[x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&array, &[1.0, 2.0, 3.0, 4.0, 5.0]);
    let stats = compute_statistics(&array, None, None).unwrap();
    assert_eq!(stats.min, 1.0);
    assert_eq!(stats.max, 5.0);
    assert_eq!(stats.mean, 3.0);
    assert!((stats.std_dev - 2.0f64.sqrt()).abs() < 1e-12);
    assert_eq!(stats.valid_count, 5);
}

#[test]
fn statistics_skip_invalid_elements() {
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 3).unwrap();
    let array = root
        .create_array("a", &[x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&array, &[1.0, 9999.0, 3.0]);
    array
        .create_attribute("_FillValue", &[], f64_type(), &OptionList::new())
        .unwrap()
        .write_f64(9999.0)
        .unwrap();
    let stats = compute_statistics(&array, None, None).unwrap();
    assert_eq!(stats.valid_count, 2);
    assert_eq!(stats.min, 1.0);
    assert_eq!(stats.max, 3.0);
    assert_eq!(stats.mean, 2.0);
}

#[test]
fn statistics_skip_nan_elements() {
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 3).unwrap();
    let array = root
        .create_array("a", &[x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&array, &[1.0, f64::NAN, 3.0]);
    let stats = compute_statistics(&array, None, None).unwrap();
    assert_eq!(stats.valid_count, 2);
    assert_eq!(stats.mean, 2.0);
    assert!(stats.std_dev.is_finite());
}

#[test]
fn statistics_read_through_cache() {
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 2).unwrap();
    let array = root
        .create_array("a", &[x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&array, &[1.0, 2.0]);

    let cache = MemoryStatisticsCache::new();
    let stored = Statistics {
        min: -1.0,
        max: -1.0,
        mean: -1.0,
        std_dev: 0.0,
        valid_count: 42,
    };
    cache.set_statistics("/a", &stored);
    let stats = compute_statistics(&array, None, Some(&cache)).unwrap();
    assert_eq!(stats, stored);

    cache.clear_statistics("/a");
    let stats = compute_statistics(&array, None, Some(&cache)).unwrap();
    assert_eq!(stats.valid_count, 2);
    assert_eq!(cache.statistics("/a").unwrap(), stats);
}

#[test]
fn statistics_reject_complex_arrays() {
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 2).unwrap();
    let array = root
        .create_array(
            "c",
            &[x],
            ExtendedDataType::numeric(NumericKind::CFloat32),
            &OptionList::new(),
        )
        .unwrap();
    assert!(matches!(
        compute_statistics(&array, None, None).unwrap_err(),
        MdError::NotSupported(_)
    ));
}

#[test]
fn statistics_can_be_cancelled() {
    let root = MemoryGroup::root();
    let x = root.create_dimension("x", "", "", 4).unwrap();
    let array = root
        .create_array("a", &[x], f64_type(), &OptionList::new())
        .unwrap();
    write_all(&array, &[1.0, 2.0, 3.0, 4.0]);
    let mut progress = |_: f64| false;
    assert!(matches!(
        compute_statistics(&array, Some(&mut progress), None).unwrap_err(),
        MdError::Stopped
    ));
}
