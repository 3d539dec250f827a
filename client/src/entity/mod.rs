mod entity_proxy;

pub use entity_proxy::EntityProxy;
