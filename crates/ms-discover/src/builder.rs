//! Graph Builder: assemble the decode front-end for a locator.

use ms_core::Result;
use ms_graph::{ElementId, ElementSpec, MediaGraph, Watch};

use crate::locator::ResourceLocator;

/// Build the front-end for `locator` and register the notifications the
/// rest of the session relies on. Returns the element producing endpoints.
pub(crate) fn build(graph: &mut dyn MediaGraph, locator: &ResourceLocator) -> Result<ElementId> {
    if let Some((device, title)) = locator.disc_title() {
        let source = graph.add(ElementSpec::DiscSource {
            device: device.to_string(),
            title,
        })?;
        let demuxer = graph.add(ElementSpec::Demuxer)?;
        graph.link(source, demuxer)?;
        if let Some(typefind) = graph.child_by_name(demuxer, "typefind") {
            graph.watch(typefind, Watch::ContainerType)?;
        }
        graph.watch(demuxer, Watch::UnknownType)?;
        graph.watch(demuxer, Watch::Endpoints)?;
        tracing::debug!(device, title, "built disc title graph");
        return Ok(demuxer);
    }

    let uri = locator.to_uri()?;
    tracing::debug!(%uri, "built generic decoder graph");
    let decoder = graph.add(ElementSpec::UriDecoder { uri })?;
    graph.watch(decoder, Watch::ElementAdded)?;
    graph.watch(decoder, Watch::Endpoints)?;
    Ok(decoder)
}

/// Hook an element the front-end created while running.
pub(crate) fn on_element_added(graph: &mut dyn MediaGraph, element: ElementId) -> Result<()> {
    if let Some(typefind) = graph.child_by_name(element, "typefind") {
        graph.watch(typefind, Watch::ContainerType)?;
    }
    graph.watch(element, Watch::UnknownType)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_core::Error;
    use ms_graph::{event_channel, GraphCall, GraphRuntime, ScriptedRuntime};

    #[test]
    fn disc_title_uses_dedicated_source() {
        let runtime = ScriptedRuntime::new();
        let (tx, _rx) = event_channel();
        let mut graph = runtime.create_graph(tx).unwrap();
        let locator = ResourceLocator::parse("dvd:///dev/sr0@2").unwrap();

        build(graph.as_mut(), &locator).unwrap();

        let added = runtime.log().added();
        assert_eq!(
            added,
            vec![
                ElementSpec::DiscSource {
                    device: "/dev/sr0".into(),
                    title: 2
                },
                ElementSpec::Demuxer,
            ]
        );
        let log = runtime.log();
        assert_eq!(
            log.count(|c| matches!(c, GraphCall::Watch { watch: Watch::ContainerType, .. })),
            1
        );
    }

    #[test]
    fn file_uses_generic_decoder() {
        let runtime = ScriptedRuntime::new();
        let (tx, _rx) = event_channel();
        let mut graph = runtime.create_graph(tx).unwrap();
        let locator = ResourceLocator::parse("/media/a.ogg").unwrap();

        build(graph.as_mut(), &locator).unwrap();

        assert_eq!(
            runtime.log().added(),
            vec![ElementSpec::UriDecoder {
                uri: "file:///media/a.ogg".into()
            }]
        );
    }

    #[test]
    fn missing_front_end_fails() {
        let runtime = ScriptedRuntime::new().refuse_element("uridecodebin");
        let (tx, _rx) = event_channel();
        let mut graph = runtime.create_graph(tx).unwrap();
        let locator = ResourceLocator::parse("v4l2:///dev/video0").unwrap();

        let err = build(graph.as_mut(), &locator).unwrap_err();
        assert!(matches!(err, Error::ElementUnavailable { .. }));
    }

    #[test]
    fn added_element_gets_type_hooks() {
        let runtime = ScriptedRuntime::new();
        let (tx, _rx) = event_channel();
        let mut graph = runtime.create_graph(tx).unwrap();
        let decoder = build(graph.as_mut(), &ResourceLocator::parse("/a.ogg").unwrap()).unwrap();
        let internal = graph.child_by_name(decoder, "decodebin").unwrap();

        on_element_added(graph.as_mut(), internal).unwrap();

        let log = runtime.log();
        assert_eq!(
            log.count(|c| matches!(c, GraphCall::Watch { watch: Watch::UnknownType, element } if *element == internal)),
            1
        );
        assert_eq!(
            log.count(|c| matches!(c, GraphCall::Watch { watch: Watch::ContainerType, .. })),
            1
        );
    }
}
