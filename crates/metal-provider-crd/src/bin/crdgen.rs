use kube::CustomResourceExt;
use metal_provider_crd::{
    Device, PortAssignment, Project, ProviderConfig, SSHKey, SpotMarketRequest, VirtualNetwork,
};

fn main() -> anyhow::Result<()> {
    let documents = [
        to_yaml::<ProviderConfig>()?,
        to_yaml::<Device>()?,
        to_yaml::<Project>()?,
        to_yaml::<SSHKey>()?,
        to_yaml::<VirtualNetwork>()?,
        to_yaml::<SpotMarketRequest>()?,
        to_yaml::<PortAssignment>()?,
    ];

    println!("{}", documents.join("---\n"));
    Ok(())
}

fn to_yaml<C>() -> anyhow::Result<String>
where
    C: CustomResourceExt,
{
    let crd = C::crd();
    Ok(serde_yaml::to_string(&crd)?)
}
